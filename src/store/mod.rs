//! Persisted artifacts: CSV caches and spreadsheet input/output.

pub mod csv_cache;
pub mod excel;

pub use csv_cache::StatsCache;
