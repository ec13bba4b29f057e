//! The metrics engine: answers one report request at a time.
//!
//! REQUEST FLOW (fixed):
//!   1. Resolve the region scope against the registry.
//!   2. Fetch day rows and the event feed. The two fetches do not depend on
//!      each other: the feed runs on a scoped worker thread while the rows
//!      are read on the caller's thread; the merge step joins them.
//!   3. Aggregate, merge events, reconcile.
//!
//! RULES:
//!   - A row-source failure fails the request. A feed failure never does.
//!   - Nothing is cached between requests; every call recomputes.
//!   - No retries anywhere.

use crate::{
    aggregate::aggregate,
    analytics::DetailRecord,
    counter::{CounterRow, Region},
    error::{MetricsError, MetricsResult},
    export::ExportTable,
    feed::{ExternalSeriesMerger, FeedResult, FetchError},
    reconcile::reconcile,
    source::{GroupedRows, RegionRegistry, RowSource},
    summary::{RegionSetAggregator, RegionSummary},
    types::{DateRange, RecordId, RegionId, RegionScope, ReportDate},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::BTreeMap, thread};
use uuid::Uuid;

/// Response of a report request.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    /// 0 for the all-regions view.
    pub region_id: RegionId,
    pub start_date: ReportDate,
    pub end_date: ReportDate,
    pub summary: CounterRow,
    /// One line per region (all-regions view) or per day (single region).
    pub metrics: Vec<CounterRow>,
    pub generated_at: DateTime<Utc>,
}

/// Response of a daily detail request.
#[derive(Debug, Clone, Serialize)]
pub struct DailyDetails {
    pub region_id: RegionId,
    pub start_date: ReportDate,
    pub end_date: ReportDate,
    pub records: Vec<DetailRecord>,
    pub current_record: DetailRecord,
}

/// Reconciled summary of a single region over a range.
struct SingleRegion {
    region: Region,
    summary: CounterRow,
    rows: Vec<CounterRow>,
    feed_available: bool,
}

pub struct MetricsEngine<S> {
    source: S,
    merger: ExternalSeriesMerger,
}

impl<S: RowSource + RegionRegistry> MetricsEngine<S> {
    pub fn new(source: S, merger: ExternalSeriesMerger) -> Self {
        Self { source, merger }
    }

    /// Summary plus per-region lines (all regions) or per-day lines (one
    /// region) for `range`.
    pub fn report(&self, scope: RegionScope, range: &DateRange) -> MetricsResult<MetricsReport> {
        let request_id = Uuid::new_v4();
        log::info!("request={request_id} report scope={scope} range={}..{}", range.start, range.end);

        let (summary, metrics) = match scope {
            RegionScope::All => {
                let summary = self.all_regions(request_id, range)?;
                (summary.grand_total, summary.per_region)
            }
            RegionScope::Region(region_id) => {
                let single = self.single_region(request_id, region_id, range)?;
                let days: Vec<CounterRow> = per_day(&single.rows, scope)
                    .into_iter()
                    .map(|mut day| {
                        day.region_name = Some(single.region.region_name.clone());
                        day
                    })
                    .collect();
                (single.summary, days)
            }
        };

        log::info!("request={request_id} done: {} metric lines", metrics.len());
        Ok(MetricsReport {
            region_id: scope.wire_id(),
            start_date: range.start.clone(),
            end_date: range.end.clone(),
            summary,
            metrics,
            generated_at: Utc::now(),
        })
    }

    /// Every stored day row of one region in `range`, each reconciled and
    /// carrying its analytics documents.
    pub fn daily_details(&self, region_id: RegionId, range: &DateRange) -> MetricsResult<DailyDetails> {
        let request_id = Uuid::new_v4();
        log::info!("request={request_id} details region={region_id} range={}..{}", range.start, range.end);

        let region = self
            .source
            .region(region_id)?
            .ok_or(MetricsError::RegionNotFound { region_id })?;
        let mut grouped = self.source.fetch_rows(RegionScope::Region(region_id), range)?;
        let mut rows = grouped.remove(&region_id).unwrap_or_default();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then(a.record_id.cmp(&b.record_id)));

        let record_ids: Vec<RecordId> = rows.iter().filter_map(|r| r.record_id).collect();
        let mut analytics = self.source.fetch_analytics(&record_ids)?;
        let records: Vec<DetailRecord> = rows
            .iter()
            .map(|row| {
                let mut counters = reconcile(row);
                counters.region_name = Some(region.region_name.clone());
                DetailRecord {
                    analytics: row
                        .record_id
                        .and_then(|id| analytics.remove(&id))
                        .unwrap_or_default(),
                    counters,
                }
            })
            .collect();

        let Some(current_record) = records.first().cloned() else {
            return Err(MetricsError::NoData {
                region_id,
                start: range.start.to_string(),
                end: range.end.to_string(),
            });
        };

        Ok(DailyDetails {
            region_id,
            start_date: range.start.clone(),
            end_date: range.end.clone(),
            records,
            current_record,
        })
    }

    /// One stored day row by record id, reconciled, with its analytics.
    pub fn record(&self, record_id: RecordId) -> MetricsResult<DetailRecord> {
        let row = self
            .source
            .fetch_record(record_id)?
            .ok_or(MetricsError::RecordNotFound { record_id })?;
        let mut counters = reconcile(&row);
        if let Some(region) = row.region_id.map(|id| self.source.region(id)).transpose()?.flatten() {
            counters.region_name = Some(region.region_name);
        }
        let analytics = self
            .source
            .fetch_analytics(&[record_id])?
            .remove(&record_id)
            .unwrap_or_default();
        Ok(DetailRecord { counters, analytics })
    }

    /// Tabular export of the same numbers `report` returns.
    pub fn export(&self, scope: RegionScope, range: &DateRange) -> MetricsResult<ExportTable> {
        let request_id = Uuid::new_v4();
        log::info!("request={request_id} export scope={scope} range={}..{}", range.start, range.end);
        match scope {
            RegionScope::All => {
                let summary = self.all_regions(request_id, range)?;
                Ok(ExportTable::for_regions(&summary, range))
            }
            RegionScope::Region(region_id) => {
                let single = self.single_region(request_id, region_id, range)?;
                Ok(ExportTable::for_region(&single.summary, single.feed_available, range))
            }
        }
    }

    fn all_regions(&self, request_id: Uuid, range: &DateRange) -> MetricsResult<RegionSummary> {
        let regions = self.source.regions()?;
        let (grouped, feed) = self.fetch_inputs(request_id, RegionScope::All, range)?;
        Ok(RegionSetAggregator::build_summary(&grouped, &regions, &feed))
    }

    fn single_region(
        &self,
        request_id: Uuid,
        region_id: RegionId,
        range: &DateRange,
    ) -> MetricsResult<SingleRegion> {
        let region = self
            .source
            .region(region_id)?
            .ok_or(MetricsError::RegionNotFound { region_id })?;
        let scope = RegionScope::Region(region_id);
        let (mut grouped, feed) = self.fetch_inputs(request_id, scope, range)?;
        let rows = grouped.remove(&region_id).unwrap_or_default();

        let mut summary = aggregate(&rows, scope);
        summary.date = None;
        summary.record_id = None;
        region.annotate(&mut summary);
        let (mut merged, _) = ExternalSeriesMerger::merge(vec![summary], &feed);
        let summary = merged
            .pop()
            .map(|row| reconcile(&row))
            .unwrap_or_else(|| CounterRow::empty_for(region_id));

        Ok(SingleRegion {
            region,
            summary,
            rows,
            feed_available: feed.is_ok(),
        })
    }

    /// Row fetch on this thread, feed fetch on a scoped worker.
    fn fetch_inputs(
        &self,
        request_id: Uuid,
        scope: RegionScope,
        range: &DateRange,
    ) -> MetricsResult<(GroupedRows, FeedResult)> {
        let merger = &self.merger;
        let (rows, feed) = thread::scope(|s| {
            let feed_worker = s.spawn(move || merger.fetch(range, scope));
            let rows = self.source.fetch_rows(scope, range);
            let feed = feed_worker
                .join()
                .unwrap_or_else(|_| Err(FetchError::Transport("feed worker panicked".into())));
            (rows, feed)
        });
        let rows = rows?;
        debug_assert!(
            rows.values()
                .flatten()
                .all(|r| r.date.as_ref().map_or(true, |d| range.contains(d))),
            "row source returned rows outside {}..{}",
            range.start,
            range.end
        );
        log::debug!(
            "request={request_id} fetched {} rows in {} regions, feed_ok={}",
            rows.values().map(Vec::len).sum::<usize>(),
            rows.len(),
            feed.is_ok()
        );
        Ok((rows, feed))
    }
}

/// One reconciled line per report day, in date order.
fn per_day(rows: &[CounterRow], scope: RegionScope) -> Vec<CounterRow> {
    let mut days: BTreeMap<Option<ReportDate>, Vec<CounterRow>> = BTreeMap::new();
    for row in rows {
        days.entry(row.date.clone()).or_default().push(row.clone());
    }
    days.into_iter()
        .map(|(date, day_rows)| {
            let mut line = aggregate(&day_rows, scope);
            line.date = date;
            reconcile(&line)
        })
        .collect()
}
