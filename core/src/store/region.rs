use super::{audit, MetricsStore};
use crate::{
    counter::Region,
    error::MetricsResult,
    source::RegionRegistry,
    types::RegionId,
};
use rusqlite::{params, OptionalExtension};

impl MetricsStore {
    /// Insert or replace a registry entry.
    pub fn upsert_region(&self, region: &Region) -> MetricsResult<()> {
        self.conn.execute(
            "INSERT INTO region (region_id, region_name, transfer_date, transfer_time)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (region_id) DO UPDATE SET
                region_name = excluded.region_name,
                transfer_date = excluded.transfer_date,
                transfer_time = excluded.transfer_time",
            params![
                region.region_id,
                region.region_name,
                region.transfer_date,
                region.transfer_time,
            ],
        )?;
        Ok(())
    }

    pub fn region_count(&self) -> MetricsResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM region", [], |row| row.get(0))?;
        Ok(n)
    }

    fn map_region(row: &rusqlite::Row<'_>) -> rusqlite::Result<Region> {
        Ok(Region {
            region_id: row.get(0)?,
            region_name: row.get(1)?,
            transfer_date: row.get(2)?,
            transfer_time: row.get(3)?,
        })
    }
}

impl RegionRegistry for MetricsStore {
    fn regions(&self) -> MetricsResult<Vec<Region>> {
        let sql = "SELECT region_id, region_name, transfer_date, transfer_time
                   FROM region ORDER BY region_name ASC, region_id ASC";
        audit("regions", sql, &[]);
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], Self::map_region)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn region(&self, region_id: RegionId) -> MetricsResult<Option<Region>> {
        let sql = "SELECT region_id, region_name, transfer_date, transfer_time
                   FROM region WHERE region_id = ?1 LIMIT 1";
        audit("region", sql, &[("region_id", region_id.to_string())]);
        let region = self
            .conn
            .query_row(sql, params![region_id], Self::map_region)
            .optional()?;
        Ok(region)
    }
}
