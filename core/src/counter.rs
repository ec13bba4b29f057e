//! The counter row: one day's (or one range's) traffic metrics for a region.
//!
//! Every field falls in exactly one of two families:
//!   - SumField:  additive counters, summed across days and regions
//!   - MeanField: rates and averages, averaged by plain row count
//!
//! The field names are part of the output contract. Export and chart
//! consumers key off them, so they must match the stored column names.

use crate::types::{RecordId, RegionId, ReportDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
    pub region_id: Option<RegionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    pub date: Option<ReportDate>,

    // ── Sum-typed counters ────────────────────────────────────────
    pub total_number: i64,
    pub number_answered: i64,
    pub number_answered_operator: i64,
    pub number_resulted_operation: i64,
    pub number_unanswered: i64,
    pub number_failed: i64,
    pub number_busy: i64,
    pub congestion: i64,
    pub mci: i64,
    pub irancell: i64,
    pub rightel: i64,
    pub fixed: i64,
    pub taliya: i64,
    pub espadan: i64,
    pub unknown: i64,
    pub other: i64,
    pub kish: i64,
    pub abandoned_calls: i64,
    pub short_calls_under_5s: i64,
    pub anonymous_calls: i64,
    pub duration_seconds: i64,
    pub duration_answered_seconds: i64,
    pub total_wait_time: i64,

    // ── Mean-typed fields (None = no data) ────────────────────────
    pub call_completion_rate: Option<f64>,
    pub average_speed_of_answer: Option<f64>,
    pub average_handle_time: Option<f64>,
    pub service_level: Option<f64>,
    pub call_abandonment_rate: Option<f64>,
    pub answer_rate: Option<f64>,
    pub average_wait_time: Option<f64>,
    pub queue_calls: Option<f64>,

    // ── Attached, never stored ────────────────────────────────────
    pub events_count: Option<i64>,
    pub transfer_date: Option<String>,
    pub transfer_time: Option<String>,
}

impl CounterRow {
    /// An empty row for one region, as produced for a region with no
    /// activity in the requested range.
    pub fn empty_for(region_id: RegionId) -> Self {
        Self {
            region_id: Some(region_id),
            ..Self::default()
        }
    }
}

macro_rules! counter_fields {
    ($name:ident, $ty:ty, [$($variant:ident => $field:ident),+ $(,)?]) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Column / JSON key of this field.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($field)),+
                }
            }

            pub fn get(self, row: &CounterRow) -> $ty {
                match self {
                    $($name::$variant => row.$field),+
                }
            }

            pub fn slot(self, row: &mut CounterRow) -> &mut $ty {
                match self {
                    $($name::$variant => &mut row.$field),+
                }
            }
        }
    };
}

counter_fields!(SumField, i64, [
    TotalNumber => total_number,
    NumberAnswered => number_answered,
    NumberAnsweredOperator => number_answered_operator,
    NumberResultedOperation => number_resulted_operation,
    NumberUnanswered => number_unanswered,
    NumberFailed => number_failed,
    NumberBusy => number_busy,
    Congestion => congestion,
    Mci => mci,
    Irancell => irancell,
    Rightel => rightel,
    Fixed => fixed,
    Taliya => taliya,
    Espadan => espadan,
    Unknown => unknown,
    Other => other,
    Kish => kish,
    AbandonedCalls => abandoned_calls,
    ShortCallsUnder5s => short_calls_under_5s,
    AnonymousCalls => anonymous_calls,
    DurationSeconds => duration_seconds,
    DurationAnsweredSeconds => duration_answered_seconds,
    TotalWaitTime => total_wait_time,
]);

counter_fields!(MeanField, Option<f64>, [
    CallCompletionRate => call_completion_rate,
    AverageSpeedOfAnswer => average_speed_of_answer,
    AverageHandleTime => average_handle_time,
    ServiceLevel => service_level,
    CallAbandonmentRate => call_abandonment_rate,
    AnswerRate => answer_rate,
    AverageWaitTime => average_wait_time,
    QueueCalls => queue_calls,
]);

/// Carrier attribution fields, checked against `total_number`.
pub const CHANNEL_FIELDS: &[SumField] = &[
    SumField::Mci,
    SumField::Irancell,
    SumField::Rightel,
    SumField::Fixed,
    SumField::Taliya,
    SumField::Espadan,
    SumField::Other,
    SumField::Unknown,
];

/// Call outcome fields, which must add up to `total_number`.
pub const STATUS_FIELDS: &[SumField] = &[
    SumField::NumberAnswered,
    SumField::NumberUnanswered,
    SumField::NumberBusy,
    SumField::NumberFailed,
    SumField::Congestion,
];

/// An entry of the region registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub region_id: RegionId,
    pub region_name: String,
    pub transfer_date: Option<String>,
    pub transfer_time: Option<String>,
}

impl Region {
    pub fn new(region_id: RegionId, region_name: impl Into<String>) -> Self {
        Self {
            region_id,
            region_name: region_name.into(),
            transfer_date: None,
            transfer_time: None,
        }
    }

    /// Copy name and transfer metadata onto a row. Transfer fields keep the
    /// latest of the row's and the registry's values.
    pub fn annotate(&self, row: &mut CounterRow) {
        row.region_name = Some(self.region_name.clone());
        row.transfer_date = latest(row.transfer_date.take(), self.transfer_date.clone());
        row.transfer_time = latest(row.transfer_time.take(), self.transfer_time.clone());
    }
}

/// MAX over optional text stamps.
pub(crate) fn latest(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b > a { b } else { a }),
        (a, b) => a.or(b),
    }
}
