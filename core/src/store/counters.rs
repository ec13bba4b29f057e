use super::{audit, MetricsStore};
use crate::{
    analytics::RecordAnalytics,
    counter::{CounterRow, MeanField, SumField},
    error::MetricsResult,
    source::{GroupedRows, RowSource},
    types::{DateRange, RecordId, RegionScope, ReportDate},
};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension};
use std::collections::HashMap;

/// Columns before the counter fields in every SELECT below.
const IDENTITY_COLUMNS: usize = 3;

fn counter_columns() -> String {
    SumField::ALL
        .iter()
        .map(|f| f.name())
        .chain(MeanField::ALL.iter().map(|f| f.name()))
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn select_rows_sql(filter: &str) -> String {
    format!(
        "SELECT record_id, region_id, report_date, {}
         FROM daily_counters
         WHERE {filter}
         ORDER BY region_id ASC, report_date ASC, record_id ASC",
        counter_columns()
    )
}

impl MetricsStore {
    /// Store one day row. Returns its record id.
    ///
    /// `date` and `region_id` are required; attached fields (events,
    /// transfer stamps, names) are not stored.
    pub fn insert_daily_row(&self, row: &CounterRow) -> MetricsResult<RecordId> {
        let region_id = row.region_id.ok_or_else(|| {
            crate::error::MetricsError::Other(anyhow::anyhow!("daily row without region_id"))
        })?;
        let date = row.date.as_ref().ok_or_else(|| {
            crate::error::MetricsError::Other(anyhow::anyhow!("daily row without date"))
        })?;

        let names = counter_columns();
        let placeholders = (1..=IDENTITY_COLUMNS - 1 + SumField::ALL.len() + MeanField::ALL.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO daily_counters (region_id, report_date, {names}) VALUES ({placeholders})"
        );

        let mut values: Vec<Value> = vec![
            Value::Integer(region_id),
            Value::Text(date.as_str().to_string()),
        ];
        values.extend(SumField::ALL.iter().map(|f| Value::Integer(f.get(row))));
        values.extend(
            MeanField::ALL
                .iter()
                .map(|f| f.get(row).map_or(Value::Null, Value::Real)),
        );

        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn daily_row_count(&self) -> MetricsResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM daily_counters", [], |row| row.get(0))?;
        Ok(n)
    }

    fn map_counter_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CounterRow> {
        let mut out = CounterRow {
            record_id: Some(row.get(0)?),
            region_id: Some(row.get(1)?),
            date: Some(ReportDate::from_stored(row.get(2)?)),
            ..CounterRow::default()
        };
        for (i, &field) in SumField::ALL.iter().enumerate() {
            // NULL counters read as 0.
            *field.slot(&mut out) = row.get::<_, Option<i64>>(IDENTITY_COLUMNS + i)?.unwrap_or(0);
        }
        let offset = IDENTITY_COLUMNS + SumField::ALL.len();
        for (i, &field) in MeanField::ALL.iter().enumerate() {
            *field.slot(&mut out) = row.get::<_, Option<f64>>(offset + i)?;
        }
        Ok(out)
    }
}

impl RowSource for MetricsStore {
    fn fetch_rows(&self, scope: RegionScope, range: &DateRange) -> MetricsResult<GroupedRows> {
        let start = range.start.as_str();
        let end = range.end.as_str();

        let rows = match scope {
            RegionScope::All => {
                let sql = select_rows_sql("report_date >= ?1 AND report_date <= ?2");
                audit(
                    "per-region",
                    &sql,
                    &[("start_date", start.into()), ("end_date", end.into())],
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![start, end], Self::map_counter_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            RegionScope::Region(region_id) => {
                let sql = select_rows_sql(
                    "region_id = ?1 AND report_date >= ?2 AND report_date <= ?3",
                );
                audit(
                    "per-date",
                    &sql,
                    &[
                        ("region_id", region_id.to_string()),
                        ("start_date", start.into()),
                        ("end_date", end.into()),
                    ],
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![region_id, start, end], Self::map_counter_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        let mut grouped = GroupedRows::new();
        for row in rows {
            if let Some(region_id) = row.region_id {
                grouped.entry(region_id).or_default().push(row);
            }
        }
        Ok(grouped)
    }

    fn fetch_record(&self, record_id: RecordId) -> MetricsResult<Option<CounterRow>> {
        let sql = select_rows_sql("record_id = ?1");
        audit("details", &sql, &[("record_id", record_id.to_string())]);
        let row = self
            .conn
            .query_row(&sql, params![record_id], Self::map_counter_row)
            .optional()?;
        Ok(row)
    }

    fn fetch_analytics(&self, record_ids: &[RecordId]) -> MetricsResult<HashMap<RecordId, RecordAnalytics>> {
        self.record_analytics(record_ids)
    }
}
