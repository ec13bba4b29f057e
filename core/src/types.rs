//! Shared primitive types used across the engine.

use crate::error::{MetricsError, MetricsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A province identifier as stored in the region registry.
pub type RegionId = i64;

/// Primary key of one stored daily counter row.
pub type RecordId = i64;

/// Resolve a region identifier from whatever shape a source hands us.
///
/// The event feed keys provinces as strings while the store uses integers,
/// so every join goes through this function. `"7"`, `" 7 "`, `7` and `7.0`
/// are the same region.
pub fn canonical_region_id(raw: &serde_json::Value) -> Option<RegionId> {
    match raw {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        serde_json::Value::String(s) => parse_integer(s),
        _ => None,
    }
}

/// Integer parsing shared by region ids and feed counts.
pub(crate) fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// A report day in `YYYY/MM/DD` form.
///
/// Stored dates are solar-calendar days, so validation only checks shape and
/// field ranges; no Gregorian calendar rules apply. The format is fixed width
/// and zero-padded, which makes string order identical to day order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportDate(String);

impl ReportDate {
    pub fn parse(raw: &str) -> MetricsResult<Self> {
        let trimmed = raw.trim();
        let invalid = || MetricsError::InvalidDate { raw: raw.to_string() };

        let parts: Vec<&str> = trimmed.split('/').collect();
        let [year, month, day] = parts.as_slice() else {
            return Err(invalid());
        };
        let widths_ok = year.len() == 4 && month.len() == 2 && day.len() == 2;
        let digits_ok = parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit()));
        if !widths_ok || !digits_ok {
            return Err(invalid());
        }

        let month: u32 = month.parse().map_err(|_| invalid())?;
        let day: u32 = day.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(invalid());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Wrap a value read back from the store, which only ever holds dates
    /// that went through `parse` on the way in.
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An inclusive day range. `start <= end` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: ReportDate,
    pub end: ReportDate,
}

impl DateRange {
    pub fn new(start: ReportDate, end: ReportDate) -> MetricsResult<Self> {
        if start > end {
            return Err(MetricsError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Validate raw request parameters.
    pub fn parse(start: &str, end: &str) -> MetricsResult<Self> {
        Self::new(ReportDate::parse(start)?, ReportDate::parse(end)?)
    }

    pub fn contains(&self, date: &ReportDate) -> bool {
        &self.start <= date && date <= &self.end
    }
}

/// Which regions a request or an aggregation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionScope {
    All,
    Region(RegionId),
}

impl RegionScope {
    /// Parse a request parameter. `0` and `all` both mean every region.
    pub fn parse(raw: &str) -> MetricsResult<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        match trimmed.parse::<RegionId>() {
            Ok(0) => Ok(Self::All),
            Ok(id) if id > 0 => Ok(Self::Region(id)),
            _ => Err(MetricsError::InvalidRegion { raw: raw.to_string() }),
        }
    }

    pub fn region_id(self) -> Option<RegionId> {
        match self {
            Self::All => None,
            Self::Region(id) => Some(id),
        }
    }

    /// The id reported back to callers: `0` stands for all regions.
    pub fn wire_id(self) -> RegionId {
        self.region_id().unwrap_or(0)
    }

    /// Whether a row with the given region belongs to this scope.
    pub fn admits(self, region_id: Option<RegionId>) -> bool {
        match (self, region_id) {
            (Self::All, _) | (_, None) => true,
            (Self::Region(scope), Some(id)) => scope == id,
        }
    }
}

impl fmt::Display for RegionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Region(id) => write!(f, "{id}"),
        }
    }
}
