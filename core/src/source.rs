//! Collaborator seams the engine reads from.
//!
//! RULE: the engine never issues SQL. It asks these traits for rows and
//! regions; `store::MetricsStore` is the production implementation.

use crate::{
    analytics::RecordAnalytics,
    counter::{CounterRow, Region},
    error::MetricsResult,
    types::{DateRange, RecordId, RegionId, RegionScope},
};
use std::collections::{BTreeMap, HashMap};

/// Per-day counter rows bucketed by region.
pub type GroupedRows = BTreeMap<RegionId, Vec<CounterRow>>;

pub trait RowSource {
    /// All stored day rows in `range` for `scope`, grouped by region and
    /// ordered by date within each group.
    fn fetch_rows(&self, scope: RegionScope, range: &DateRange) -> MetricsResult<GroupedRows>;

    /// One stored day row by primary key.
    fn fetch_record(&self, record_id: RecordId) -> MetricsResult<Option<CounterRow>>;

    /// Analytics documents of the given records. Sources that keep none
    /// return an empty map.
    fn fetch_analytics(&self, _record_ids: &[RecordId]) -> MetricsResult<HashMap<RecordId, RecordAnalytics>> {
        Ok(HashMap::new())
    }
}

pub trait RegionRegistry {
    /// Every known region, ordered by name.
    fn regions(&self) -> MetricsResult<Vec<Region>>;

    fn region(&self, region_id: RegionId) -> MetricsResult<Option<Region>> {
        Ok(self
            .regions()?
            .into_iter()
            .find(|r| r.region_id == region_id))
    }
}

impl<T: RowSource + ?Sized> RowSource for &T {
    fn fetch_rows(&self, scope: RegionScope, range: &DateRange) -> MetricsResult<GroupedRows> {
        (**self).fetch_rows(scope, range)
    }

    fn fetch_record(&self, record_id: RecordId) -> MetricsResult<Option<CounterRow>> {
        (**self).fetch_record(record_id)
    }

    fn fetch_analytics(&self, record_ids: &[RecordId]) -> MetricsResult<HashMap<RecordId, RecordAnalytics>> {
        (**self).fetch_analytics(record_ids)
    }
}

impl<T: RegionRegistry + ?Sized> RegionRegistry for &T {
    fn regions(&self) -> MetricsResult<Vec<Region>> {
        (**self).regions()
    }

    fn region(&self, region_id: RegionId) -> MetricsResult<Option<Region>> {
        (**self).region(region_id)
    }
}
