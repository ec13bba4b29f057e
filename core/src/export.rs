//! Export table: the report laid out as ordered columns for the
//! spreadsheet writer.
//!
//! Layout:
//!   - all regions: one line per region by name, then a "Grand total" line
//!     with no region id and no transfer date
//!   - one region:  a single line
//!
//! number_resulted_operation is replaced by the feed's count for matched
//! regions (and by the feed total on the grand-total line), but only when
//! the feed answered. Means print with two decimals; no data prints empty.

use crate::{
    counter::{CounterRow, MeanField, SumField},
    summary::RegionSummary,
    types::DateRange,
};
use serde::Serialize;

pub const GRAND_TOTAL_LABEL: &str = "Grand total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportField {
    RegionName,
    RegionId,
    TransferDate,
    Sum(SumField),
    Mean(MeanField),
}

impl ExportField {
    pub fn key(self) -> &'static str {
        match self {
            ExportField::RegionName => "region_name",
            ExportField::RegionId => "region_id",
            ExportField::TransferDate => "transfer_date",
            ExportField::Sum(f) => f.name(),
            ExportField::Mean(f) => f.name(),
        }
    }
}

/// Output columns, in sheet order.
pub const EXPORT_COLUMNS: &[(ExportField, &str)] = &[
    (ExportField::RegionName, "Region"),
    (ExportField::RegionId, "Region id"),
    (ExportField::TransferDate, "Last transfer date"),
    (ExportField::Sum(SumField::TotalNumber), "Total calls"),
    (ExportField::Sum(SumField::NumberAnsweredOperator), "Answered by operator"),
    (ExportField::Sum(SumField::NumberResultedOperation), "Resulted in operation"),
    (ExportField::Sum(SumField::NumberAnswered), "Answered"),
    (ExportField::Sum(SumField::NumberUnanswered), "Unanswered"),
    (ExportField::Sum(SumField::NumberFailed), "Failed"),
    (ExportField::Sum(SumField::NumberBusy), "Busy"),
    (ExportField::Sum(SumField::Congestion), "Congestion"),
    (ExportField::Sum(SumField::Rightel), "Rightel"),
    (ExportField::Sum(SumField::Irancell), "Irancell"),
    (ExportField::Sum(SumField::Fixed), "Fixed line"),
    (ExportField::Sum(SumField::Unknown), "Unknown"),
    (ExportField::Sum(SumField::Taliya), "Taliya"),
    (ExportField::Sum(SumField::Espadan), "Espadan"),
    (ExportField::Sum(SumField::Mci), "MCI"),
    (ExportField::Sum(SumField::AbandonedCalls), "Abandoned"),
    (ExportField::Sum(SumField::ShortCallsUnder5s), "Short calls (<5s)"),
    (ExportField::Mean(MeanField::AnswerRate), "Answer rate (%)"),
    (ExportField::Mean(MeanField::CallAbandonmentRate), "Abandonment rate (%)"),
    (ExportField::Mean(MeanField::ServiceLevel), "Service level (%)"),
    (ExportField::Mean(MeanField::AverageHandleTime), "Average handle time (s)"),
    (ExportField::Mean(MeanField::AverageWaitTime), "Average wait time (s)"),
    (ExportField::Mean(MeanField::QueueCalls), "Queued calls"),
    (ExportField::Sum(SumField::TotalWaitTime), "Total wait time (s)"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExportCell {
    Integer(i64),
    /// Already rounded to two decimals.
    Decimal(f64),
    Text(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportColumn {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportLine {
    pub cells: Vec<ExportCell>,
    pub grand_total: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    pub title: String,
    pub columns: Vec<ExportColumn>,
    pub lines: Vec<ExportLine>,
}

impl ExportTable {
    pub fn for_regions(summary: &RegionSummary, range: &DateRange) -> Self {
        let mut regions: Vec<&CounterRow> = summary.per_region.iter().collect();
        regions.sort_by(|a, b| a.region_name.cmp(&b.region_name).then(a.region_id.cmp(&b.region_id)));

        let mut lines: Vec<ExportLine> = regions
            .into_iter()
            .map(|row| ExportLine {
                cells: render(&with_operations(row, summary.feed_available, row.events_count)),
                grand_total: false,
            })
            .collect();

        let mut total = with_operations(
            &summary.grand_total,
            summary.feed_available,
            Some(summary.total_events),
        );
        total.region_name = Some(GRAND_TOTAL_LABEL.into());
        total.region_id = None;
        total.transfer_date = None;
        lines.push(ExportLine {
            cells: render(&total),
            grand_total: true,
        });

        Self::new(range, lines)
    }

    pub fn for_region(summary: &CounterRow, feed_available: bool, range: &DateRange) -> Self {
        let row = with_operations(summary, feed_available, summary.events_count);
        Self::new(
            range,
            vec![ExportLine {
                cells: render(&row),
                grand_total: false,
            }],
        )
    }

    fn new(range: &DateRange, lines: Vec<ExportLine>) -> Self {
        Self {
            title: format!("Call report {} to {}", range.start, range.end),
            columns: EXPORT_COLUMNS
                .iter()
                .map(|&(field, label)| ExportColumn {
                    key: field.key(),
                    label,
                })
                .collect(),
            lines,
        }
    }

    /// Cell of `key` on line `line`, for callers and tests that look values
    /// up by column name.
    pub fn cell(&self, line: usize, key: &str) -> Option<&ExportCell> {
        let col = self.columns.iter().position(|c| c.key == key)?;
        self.lines.get(line)?.cells.get(col)
    }
}

fn with_operations(row: &CounterRow, feed_available: bool, events: Option<i64>) -> CounterRow {
    let mut out = row.clone();
    if let (true, Some(events)) = (feed_available, events) {
        out.number_resulted_operation = events;
    }
    out
}

fn render(row: &CounterRow) -> Vec<ExportCell> {
    EXPORT_COLUMNS
        .iter()
        .map(|(field, _)| match *field {
            ExportField::RegionName => row
                .region_name
                .clone()
                .map_or(ExportCell::Empty, ExportCell::Text),
            ExportField::RegionId => row.region_id.map_or(ExportCell::Empty, ExportCell::Integer),
            ExportField::TransferDate => row
                .transfer_date
                .clone()
                .map_or(ExportCell::Empty, ExportCell::Text),
            ExportField::Sum(f) => ExportCell::Integer(f.get(row)),
            ExportField::Mean(f) => f
                .get(row)
                .map_or(ExportCell::Empty, |v| ExportCell::Decimal((v * 100.0).round() / 100.0)),
        })
        .collect()
}
