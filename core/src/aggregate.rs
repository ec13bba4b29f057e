//! Range aggregation: fold many counter rows of one scope into one row.
//!
//! Rules:
//!   - SumField values are added, absent counts as 0. Sums saturate at
//!     i64::MAX instead of wrapping.
//!   - MeanField values are averaged over the rows that carry a value,
//!     one row one vote. Rows are NOT weighted by total_number or by day
//!     count. Reported numbers depend on this; keep it that way.
//!   - No rows, or no row carrying a mean field, gives None for that mean.
//!     None means "no data" and must not be shown as 0.

use crate::{
    counter::{latest, CounterRow, MeanField, SumField},
    types::RegionScope,
};

/// Aggregate `rows` into one summary row for `scope`.
///
/// All rows must belong to the scope: one region over many days, or many
/// regions together. Passing rows of another region is a caller bug.
pub fn aggregate(rows: &[CounterRow], scope: RegionScope) -> CounterRow {
    debug_assert!(
        rows.iter().all(|r| scope.admits(r.region_id)),
        "aggregate() called with rows outside scope {scope}"
    );

    let mut out = CounterRow {
        region_id: scope.region_id(),
        ..CounterRow::default()
    };

    for &field in SumField::ALL {
        *field.slot(&mut out) = rows
            .iter()
            .fold(0i64, |acc, r| acc.saturating_add(field.get(r)));
    }
    for &field in MeanField::ALL {
        *field.slot(&mut out) = mean(rows.iter().filter_map(|r| field.get(r)));
    }

    out.events_count = rows
        .iter()
        .filter_map(|r| r.events_count)
        .reduce(i64::saturating_add);
    out.transfer_date = rows
        .iter()
        .fold(None, |acc, r| latest(acc, r.transfer_date.clone()));
    out.transfer_time = rows
        .iter()
        .fold(None, |acc, r| latest(acc, r.transfer_time.clone()));

    // Identity survives only when every input agrees on it.
    out.date = shared(rows, |r| r.date.clone());
    out.region_name = shared(rows, |r| r.region_name.clone());
    if let [single] = rows {
        out.record_id = single.record_id;
    }

    out
}

/// Unweighted arithmetic mean. None for an empty input.
pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn shared<T: PartialEq>(rows: &[CounterRow], key: impl Fn(&CounterRow) -> Option<T>) -> Option<T> {
    let mut values = rows.iter().map(key);
    let first = values.next()??;
    values.all(|v| v.as_ref() == Some(&first)).then_some(first)
}
