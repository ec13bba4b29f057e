//! Region-set aggregation: the "all provinces" view.
//!
//! Per region:   reconcile(aggregate(rows of that region)) + feed events
//! Grand total:  aggregate(per-region rows), NOT a rescan of day rows, so
//!               its means are a plain mean of the regional means.
//!               events_count = total of the whole feed, then reconcile.
//!
//! Every registry region gets a line, with zeros when it had no traffic.

use crate::{
    aggregate::aggregate,
    counter::{CounterRow, Region},
    feed::{ExternalSeriesMerger, FeedResult},
    reconcile::reconcile,
    source::GroupedRows,
    types::RegionScope,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    /// One reconciled row per registry region, in registry order.
    pub per_region: Vec<CounterRow>,
    pub grand_total: CounterRow,
    /// Sum over the whole feed; 0 when the feed failed.
    pub total_events: i64,
    /// Whether the feed overlay was applied.
    pub feed_available: bool,
}

pub struct RegionSetAggregator;

impl RegionSetAggregator {
    pub fn build_summary(grouped: &GroupedRows, regions: &[Region], feed: &FeedResult) -> RegionSummary {
        for region_id in grouped.keys() {
            if !regions.iter().any(|r| r.region_id == *region_id) {
                log::warn!("rows for region {region_id} have no registry entry; left out of the summary");
            }
        }

        let aggregated: Vec<CounterRow> = regions
            .iter()
            .map(|region| {
                let rows = grouped
                    .get(&region.region_id)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let mut row = aggregate(rows, RegionScope::Region(region.region_id));
                row.date = None;
                row.record_id = None;
                region.annotate(&mut row);
                row
            })
            .collect();

        let (with_events, total_events) = ExternalSeriesMerger::merge(aggregated, feed);
        let per_region: Vec<CounterRow> = with_events.iter().map(reconcile).collect();

        let mut grand_total = aggregate(&per_region, RegionScope::All);
        grand_total.region_name = None;
        grand_total.transfer_date = None;
        grand_total.transfer_time = None;
        grand_total.events_count = Some(total_events);
        let grand_total = reconcile(&grand_total);

        RegionSummary {
            per_region,
            grand_total,
            total_events,
            feed_available: feed.is_ok(),
        }
    }
}
