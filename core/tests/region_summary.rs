//! Region-set summary tests.
//!
//! Covers:
//! 1. Every registry region gets a line, zero-filled when it had no rows
//! 2. Grand total is built from the regional lines (mean of means)
//! 3. Feed events on regional lines and the grand total
//! 4. Rows for regions missing from the registry are left out

use callstats_core::{
    counter::{CounterRow, Region},
    feed::{ExternalEventPoint, FetchError},
    reconcile::{channel_sum, status_sum},
    source::GroupedRows,
    summary::RegionSetAggregator,
    types::ReportDate,
};

fn registry() -> Vec<Region> {
    let mut fars = Region::new(3, "Fars");
    fars.transfer_date = Some("1403/01/10".into());
    vec![Region::new(2, "Isfahan"), fars, Region::new(1, "Tehran")]
}

fn day(region_id: i64, date: &str, total: i64, answer_rate: f64) -> CounterRow {
    CounterRow {
        region_id: Some(region_id),
        date: Some(ReportDate::parse(date).unwrap()),
        total_number: total,
        number_answered: total,
        mci: total,
        answer_rate: Some(answer_rate),
        ..CounterRow::default()
    }
}

fn grouped(rows: Vec<CounterRow>) -> GroupedRows {
    let mut out = GroupedRows::new();
    for row in rows {
        out.entry(row.region_id.unwrap()).or_default().push(row);
    }
    out
}

fn no_feed() -> Result<Vec<ExternalEventPoint>, FetchError> {
    Err(FetchError::Disabled)
}

// ─────────────────────────────────────────────────────────────────────────────
// Left join over the registry
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn every_registry_region_gets_a_line() {
    let rows = grouped(vec![day(1, "1403/01/01", 100, 80.0)]);
    let summary = RegionSetAggregator::build_summary(&rows, &registry(), &no_feed());

    let ids: Vec<Option<i64>> = summary.per_region.iter().map(|r| r.region_id).collect();
    assert_eq!(ids, vec![Some(2), Some(3), Some(1)], "registry order is kept");

    let fars = &summary.per_region[1];
    assert_eq!(fars.region_name.as_deref(), Some("Fars"));
    assert_eq!(fars.total_number, 0);
    assert_eq!(fars.answer_rate, None);
    assert_eq!(fars.transfer_date.as_deref(), Some("1403/01/10"));
}

#[test]
fn regional_lines_have_no_date_or_record() {
    let rows = grouped(vec![day(1, "1403/01/01", 100, 80.0)]);
    let summary = RegionSetAggregator::build_summary(&rows, &registry(), &no_feed());
    let tehran = &summary.per_region[2];
    assert_eq!(tehran.date, None);
    assert_eq!(tehran.record_id, None);
}

#[test]
fn unregistered_region_rows_are_dropped() {
    let rows = grouped(vec![day(1, "1403/01/01", 100, 80.0), day(42, "1403/01/01", 900, 10.0)]);
    let summary = RegionSetAggregator::build_summary(&rows, &registry(), &no_feed());

    assert_eq!(summary.per_region.len(), 3);
    assert_eq!(summary.grand_total.total_number, 100, "region 42 contributes nothing");
}

// ─────────────────────────────────────────────────────────────────────────────
// Grand total
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn grand_total_means_are_a_mean_of_regional_means() {
    // Tehran: two days at 90 and 70 -> regional mean 80.
    // Isfahan: one day at 20.
    // Row-level mean would be 60; mean of regional means is 50.
    let rows = grouped(vec![
        day(1, "1403/01/01", 100, 90.0),
        day(1, "1403/01/02", 100, 70.0),
        day(2, "1403/01/01", 50, 20.0),
    ]);
    let summary = RegionSetAggregator::build_summary(&rows, &registry(), &no_feed());

    assert_eq!(summary.per_region[2].answer_rate, Some(80.0));
    assert_eq!(summary.grand_total.answer_rate, Some(50.0), "Fars has no data and is skipped");
    assert_eq!(summary.grand_total.total_number, 250);
    assert_eq!(summary.grand_total.mci, 250);
}

#[test]
fn grand_total_carries_no_region_identity() {
    let rows = grouped(vec![day(1, "1403/01/01", 10, 1.0)]);
    let summary = RegionSetAggregator::build_summary(&rows, &registry(), &no_feed());
    let total = &summary.grand_total;
    assert_eq!(total.region_id, None);
    assert_eq!(total.region_name, None);
    assert_eq!(total.transfer_date, None);
    assert_eq!(total.transfer_time, None);
}

#[test]
fn every_line_is_reconciled() {
    let mut noisy = day(1, "1403/01/01", 100, 50.0);
    noisy.other = 20;
    noisy.number_answered = 60;
    let summary = RegionSetAggregator::build_summary(&grouped(vec![noisy]), &registry(), &no_feed());

    let tehran = &summary.per_region[2];
    assert_eq!(channel_sum(tehran), 100);
    assert_eq!(status_sum(tehran), 100);
    assert_eq!(status_sum(&summary.grand_total), summary.grand_total.total_number);
}

// ─────────────────────────────────────────────────────────────────────────────
// Feed events
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn feed_events_reach_regions_and_grand_total() {
    let feed = Ok(vec![
        ExternalEventPoint { region_id: 1, events_count: 120 },
        ExternalEventPoint { region_id: 2, events_count: 80 },
    ]);
    let rows = grouped(vec![day(1, "1403/01/01", 100, 80.0), day(2, "1403/01/01", 100, 80.0)]);
    let summary = RegionSetAggregator::build_summary(&rows, &registry(), &feed);

    assert!(summary.feed_available);
    assert_eq!(summary.total_events, 200);
    assert_eq!(summary.grand_total.events_count, Some(200));
    assert_eq!(summary.per_region[2].events_count, Some(120));
    assert_eq!(summary.per_region[0].events_count, Some(80));
    assert_eq!(summary.per_region[1].events_count, None);
}

#[test]
fn failed_feed_gives_zero_total_and_no_regional_events() {
    let rows = grouped(vec![day(1, "1403/01/01", 100, 80.0)]);
    let summary = RegionSetAggregator::build_summary(
        &rows,
        &registry(),
        &Err(FetchError::Timeout("read timed out".into())),
    );

    assert!(!summary.feed_available);
    assert_eq!(summary.total_events, 0);
    assert_eq!(summary.grand_total.events_count, Some(0));
    assert!(summary.per_region.iter().all(|r| r.events_count.is_none()));
    assert_eq!(summary.grand_total.total_number, 100, "counters are unaffected");
}
