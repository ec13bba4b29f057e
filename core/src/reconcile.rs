//! Breakdown reconciliation: makes a row's breakdowns agree with its total.
//!
//! Two independent checks, always in this order:
//!   1. Channels: mci+irancell+rightel+fixed+taliya+espadan+other+unknown
//!      may not exceed total_number. Overflow is taken out of `other`,
//!      clamped at 0. Whatever `other` cannot absorb is left in place;
//!      no other carrier is touched. Under-counting is accepted.
//!   2. Statuses: answered+unanswered+busy+failed+congestion must equal
//!      total_number. The difference (either sign) goes into `congestion`,
//!      clamped at 0. A clamped row is reported as-is.
//!
//! Reconciling a reconciled row changes nothing. Nothing here can fail.

use crate::counter::{CounterRow, SumField, CHANNEL_FIELDS, STATUS_FIELDS};

/// Return a reconciled copy of `row`.
pub fn reconcile(row: &CounterRow) -> CounterRow {
    let mut out = row.clone();

    // Counters are counts. A negative value is bad input and reads as 0.
    for &field in SumField::ALL {
        let value = field.slot(&mut out);
        if *value < 0 {
            *value = 0;
        }
    }
    if out.events_count.is_some_and(|e| e < 0) {
        out.events_count = Some(0);
    }

    reconcile_channels(&mut out);
    reconcile_statuses(&mut out);
    out
}

pub fn channel_sum(row: &CounterRow) -> i64 {
    saturating_sum(row, CHANNEL_FIELDS)
}

pub fn status_sum(row: &CounterRow) -> i64 {
    saturating_sum(row, STATUS_FIELDS)
}

fn saturating_sum(row: &CounterRow, fields: &[SumField]) -> i64 {
    fields
        .iter()
        .fold(0i64, |acc, f| acc.saturating_add(f.get(row)))
}

fn reconcile_channels(row: &mut CounterRow) {
    let computed = channel_sum(row);
    if computed <= row.total_number {
        return;
    }
    let excess = computed.saturating_sub(row.total_number);
    if row.other < excess {
        log::debug!(
            "region={:?} date={:?}: channel overflow {excess} exceeds other={}, {} left unabsorbed",
            row.region_id,
            row.date,
            row.other,
            excess.saturating_sub(row.other)
        );
    }
    row.other = row.other.saturating_sub(excess).max(0);
}

fn reconcile_statuses(row: &mut CounterRow) {
    let computed = status_sum(row);
    if computed == row.total_number {
        return;
    }
    let remainder = row.total_number.saturating_sub(computed);
    row.congestion = row.congestion.saturating_add(remainder).max(0);
}
