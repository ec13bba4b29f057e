//! Per-record analytics: JSON documents stored next to a day row
//! (operator tables, hourly volumes, duration histograms, ...).
//!
//! The engine never computes these. Loaders write them as JSON text and
//! detail requests hand them back decoded. A column that is empty or does
//! not decode as JSON reads as None.

use crate::{counter::CounterRow, types::RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! analytics_columns {
    ($($field:ident),+ $(,)?) => {
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct RecordAnalytics {
            $(pub $field: Option<Value>,)+
        }

        impl RecordAnalytics {
            /// Column names, in storage order.
            pub const COLUMNS: &'static [&'static str] = &[$(stringify!($field)),+];

            /// Decode raw column text given in `COLUMNS` order.
            pub fn from_raw(record_id: RecordId, raw: &[Option<String>]) -> Self {
                let mut cells = raw.iter();
                Self {
                    $($field: decode(
                        record_id,
                        stringify!($field),
                        cells.next().and_then(|c| c.as_deref()),
                    ),)+
                }
            }

            /// JSON text per column in `COLUMNS` order, None for absent.
            pub fn to_raw(&self) -> Vec<Option<String>> {
                vec![$(self.$field.as_ref().map(Value::to_string)),+]
            }

            pub fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())+
            }
        }
    };
}

analytics_columns!(
    handled_calls_per_operator,
    average_talk_time_per_operator,
    operator_missed_call_rate,
    operator_answer_rate,
    hourly_call_volume,
    daily_call_volume,
    daily_call_trend,
    peak_hour_analysis,
    avg_duration_by_hour,
    call_origin_type,
    queue_time,
    zero_billsec_calls,
    repeated_caller_analysis,
    call_duration_distribution,
    abandoned_call_analysis,
);

fn decode(record_id: RecordId, column: &str, raw: Option<&str>) -> Option<Value> {
    let text = raw.map(str::trim).filter(|t| !t.is_empty())?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("record={record_id} column={column}: not JSON ({e}), reading as null");
            None
        }
    }
}

/// One stored day row as returned by detail requests: reconciled counters
/// plus the record's analytics documents, flattened into one object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailRecord {
    #[serde(flatten)]
    pub counters: CounterRow,
    #[serde(flatten)]
    pub analytics: RecordAnalytics,
}
