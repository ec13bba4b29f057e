//! Call-center metrics: per-region daily counters rolled up into range and
//! all-region summaries, reconciled against their declared totals, and
//! overlaid with an external event-count feed.

pub mod aggregate;
pub mod analytics;
pub mod config;
pub mod counter;
pub mod engine;
pub mod error;
pub mod export;
pub mod feed;
pub mod reconcile;
pub mod source;
pub mod store;
pub mod summary;
pub mod types;
