use super::{audit, MetricsStore};
use crate::{analytics::RecordAnalytics, error::MetricsResult, types::RecordId};
use rusqlite::{params_from_iter, types::Value};
use std::collections::HashMap;

fn analytics_columns() -> String {
    RecordAnalytics::COLUMNS
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

impl MetricsStore {
    /// Insert or replace the analytics documents of one record.
    pub fn upsert_record_analytics(
        &self,
        record_id: RecordId,
        analytics: &RecordAnalytics,
    ) -> MetricsResult<()> {
        let updates = RecordAnalytics::COLUMNS
            .iter()
            .map(|name| format!("\"{name}\" = excluded.\"{name}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=RecordAnalytics::COLUMNS.len() + 1)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO record_analytics (record_id, {}) VALUES ({placeholders})
             ON CONFLICT (record_id) DO UPDATE SET {updates}",
            analytics_columns()
        );

        let mut values = vec![Value::Integer(record_id)];
        values.extend(
            analytics
                .to_raw()
                .into_iter()
                .map(|cell| cell.map_or(Value::Null, Value::Text)),
        );
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    /// Decoded analytics for `record_ids`. Records without a stored entry
    /// are absent from the map.
    pub(crate) fn record_analytics(
        &self,
        record_ids: &[RecordId],
    ) -> MetricsResult<HashMap<RecordId, RecordAnalytics>> {
        if record_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = (1..=record_ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT record_id, {} FROM record_analytics WHERE record_id IN ({placeholders})",
            analytics_columns()
        );
        let ids = record_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        audit("analytics", &sql, &[("record_ids", ids)]);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(record_ids.iter()), |row| {
                let record_id: RecordId = row.get(0)?;
                let raw = (1..=RecordAnalytics::COLUMNS.len())
                    .map(|i| row.get::<_, Option<String>>(i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((record_id, raw))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(record_id, raw)| (record_id, RecordAnalytics::from_raw(record_id, &raw)))
            .collect())
    }
}
