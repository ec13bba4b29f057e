//! External "resulting operations" feed and the merge of its counts into
//! counter rows.
//!
//! The feed is an overlay. If it fails for any reason the rows go out
//! without `events_count` and the request still succeeds; a FetchError
//! never leaves this module as a request failure.

use crate::{
    config::FeedConfig,
    counter::CounterRow,
    types::{canonical_region_id, parse_integer, DateRange, RegionId, RegionScope},
};
use serde::Serialize;
use serde_json::Value;
use std::{collections::HashMap, io, time::Duration};
use thiserror::Error;

/// One region's event count for the requested range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExternalEventPoint {
    pub region_id: RegionId,
    pub events_count: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("event feed is disabled")]
    Disabled,

    #[error("event feed timed out: {0}")]
    Timeout(String),

    #[error("event feed transport error: {0}")]
    Transport(String),

    #[error("event feed returned http status {0}")]
    Status(u16),

    #[error("event feed returned a malformed body: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Short stable label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Disabled => "disabled",
            FetchError::Timeout(_) => "timeout",
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "http_status",
            FetchError::Malformed(_) => "malformed",
        }
    }
}

pub type FeedResult = Result<Vec<ExternalEventPoint>, FetchError>;

/// A source of per-region event counts.
///
/// Implementations are called from a worker thread while the row fetch runs
/// on the caller's thread, hence `Send + Sync`.
pub trait EventFeed: Send + Sync {
    fn fetch(&self, range: &DateRange, scope: RegionScope) -> FeedResult;
}

/// Stand-in used when the feed is switched off in configuration.
pub struct DisabledFeed;

impl EventFeed for DisabledFeed {
    fn fetch(&self, _range: &DateRange, _scope: RegionScope) -> FeedResult {
        Err(FetchError::Disabled)
    }
}

#[derive(Serialize)]
struct FeedRequestBody<'a> {
    api_key: &'a str,
    date_start: &'a str,
    date_end: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    region_id: Option<RegionId>,
}

/// HTTP client for the feed: one POST, one attempt, no retry.
pub struct HttpEventFeed {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

impl HttpEventFeed {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        // `timeout` bounds the whole request; the per-call limits stop a
        // single stalled connect or read early.
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            Duration::from_millis(config.timeout_ms.max(1)),
        )
    }
}

impl EventFeed for HttpEventFeed {
    fn fetch(&self, range: &DateRange, scope: RegionScope) -> FeedResult {
        let body = FeedRequestBody {
            api_key: &self.api_key,
            date_start: range.start.as_str(),
            date_end: range.end.as_str(),
            region_id: scope.region_id(),
        };
        let response = self
            .agent
            .post(&self.endpoint)
            .set("content-type", "application/json")
            .set("accept", "application/json")
            .send_json(&body)
            .map_err(fetch_error_from_ureq)?;

        if !(200..=299).contains(&response.status()) {
            return Err(FetchError::Status(response.status()));
        }
        let payload: Value = response.into_json().map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FetchError::Timeout(e.to_string()),
            _ => FetchError::Malformed(e.to_string()),
        })?;
        parse_feed_payload(&payload)
    }
}

fn fetch_error_from_ureq(err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::Status(status, _) => FetchError::Status(status),
        ureq::Error::Transport(transport) => {
            let text = format!("{:?} {}", transport.kind(), transport);
            let lower = text.to_ascii_lowercase();
            // Read timeouts surface as EAGAIN on some platforms.
            let timed_out = ["timed out", "timeout", "temporarily unavailable"]
                .iter()
                .any(|needle| lower.contains(needle));
            if timed_out {
                FetchError::Timeout(text)
            } else {
                FetchError::Transport(text)
            }
        }
    }
}

/// Decode a feed body: a JSON array of `{province_id, events_count}`.
///
/// Anything but an array is malformed. Entries missing either key, or with a
/// value that is not an integer (numeric strings are accepted), are skipped.
pub fn parse_feed_payload(payload: &Value) -> FeedResult {
    let items = payload
        .as_array()
        .ok_or_else(|| FetchError::Malformed(format!("expected an array, got {}", json_kind(payload))))?;

    let mut points = Vec::with_capacity(items.len());
    for item in items {
        let region = item
            .get("province_id")
            .or_else(|| item.get("region_id"))
            .and_then(canonical_region_id);
        let count = item.get("events_count").and_then(integer_value);
        match (region, count) {
            (Some(region_id), Some(events_count)) => points.push(ExternalEventPoint {
                region_id,
                events_count,
            }),
            _ => log::debug!("skipping feed entry without usable keys: {item}"),
        }
    }
    Ok(points)
}

fn integer_value(raw: &Value) -> Option<i64> {
    match raw {
        Value::String(s) => parse_integer(s),
        other => canonical_region_id(other),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fetches the feed and joins it into counter rows.
pub struct ExternalSeriesMerger {
    feed: Box<dyn EventFeed>,
}

impl ExternalSeriesMerger {
    pub fn new(feed: Box<dyn EventFeed>) -> Self {
        Self { feed }
    }

    /// HTTP feed when enabled, otherwise a feed that always reports Disabled.
    pub fn from_config(config: &FeedConfig) -> Self {
        if config.enabled {
            Self::new(Box::new(HttpEventFeed::from_config(config)))
        } else {
            Self::new(Box::new(DisabledFeed))
        }
    }

    /// Single attempt. Failures are logged here and handed back as a value.
    pub fn fetch(&self, range: &DateRange, scope: RegionScope) -> FeedResult {
        let result = self.feed.fetch(range, scope);
        match &result {
            Ok(points) => log::debug!(
                "event feed scope={scope} range={}..{}: {} points",
                range.start,
                range.end,
                points.len()
            ),
            Err(FetchError::Disabled) => log::debug!("event feed disabled, skipping overlay"),
            Err(e) => log::warn!(
                "event feed scope={scope} failed ({}): {e}; continuing without events",
                e.kind()
            ),
        }
        result
    }

    /// Attach feed counts to `rows` and total the whole feed.
    ///
    /// Rows match on canonical region id. Rows with no match keep their
    /// `events_count` untouched. The total covers every feed entry, including
    /// regions with no row here. A failed feed leaves rows as they are and
    /// totals 0. When the feed repeats a region, the last entry wins the
    /// per-row lookup and every entry counts toward the total. Negative
    /// counts read as 0, both per row and in the total.
    pub fn merge(mut rows: Vec<CounterRow>, feed: &FeedResult) -> (Vec<CounterRow>, i64) {
        let Ok(points) = feed else {
            return (rows, 0);
        };

        let lookup: HashMap<RegionId, i64> = points
            .iter()
            .map(|p| (p.region_id, p.events_count.max(0)))
            .collect();
        let total_events = points
            .iter()
            .fold(0i64, |acc, p| acc.saturating_add(p.events_count.max(0)));

        let mut matched = 0usize;
        for row in &mut rows {
            if let Some(count) = row.region_id.and_then(|id| lookup.get(&id)) {
                row.events_count = Some(*count);
                matched += 1;
            }
        }
        log::debug!(
            "event feed matched {matched}/{} rows, total_events={total_events}",
            rows.len()
        );
        (rows, total_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_must_be_an_array() {
        let err = parse_feed_payload(&json!({"error": "bad key"})).unwrap_err();
        assert_eq!(err.kind(), "malformed");
        assert!(parse_feed_payload(&json!(null)).is_err());
    }

    #[test]
    fn payload_accepts_mixed_key_types_and_skips_junk() {
        let points = parse_feed_payload(&json!([
            {"province_id": "1", "events_count": 120},
            {"province_id": 2, "events_count": "80"},
            {"province_id": "x", "events_count": 5},
            {"events_count": 9},
            {"province_id": 4}
        ]))
        .unwrap();
        assert_eq!(
            points,
            vec![
                ExternalEventPoint { region_id: 1, events_count: 120 },
                ExternalEventPoint { region_id: 2, events_count: 80 },
            ]
        );
    }

    #[test]
    fn disabled_feed_reports_disabled() {
        let range = DateRange::parse("1403/01/01", "1403/01/02").unwrap();
        let merger = ExternalSeriesMerger::from_config(&FeedConfig::default());
        assert_eq!(merger.fetch(&range, RegionScope::All), Err(FetchError::Disabled));
    }
}
