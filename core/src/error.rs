use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid date '{raw}': expected YYYY/MM/DD")]
    InvalidDate { raw: String },

    #[error("Invalid region '{raw}': expected 0, 'all' or a positive integer")]
    InvalidRegion { raw: String },

    #[error("Invalid range: start_date {start} is after end_date {end}")]
    InvalidRange { start: String, end: String },

    #[error("Region {region_id} not found")]
    RegionNotFound { region_id: i64 },

    #[error("Record {record_id} not found")]
    RecordNotFound { record_id: i64 },

    #[error("No data found for region {region_id} between {start} and {end}")]
    NoData { region_id: i64, start: String, end: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type MetricsResult<T> = Result<T, MetricsError>;
