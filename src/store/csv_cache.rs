//! CSV-backed caches (header row + typed columns, one row per entity).

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::DriverSessionStat;

/// Read all rows of a typed CSV table. Returns an empty table when the file
/// does not exist yet.
pub fn load_or_empty<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    load(path)
}

/// Read all rows of a typed CSV table.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(rows)
}

/// Rewrite a typed CSV table in full, creating parent directories if needed.
pub fn write<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// The driver-stats cache with its skip-set of already-fetched entities.
///
/// The cache file is rewritten in full after every appended row, so an
/// interrupted run loses at most the one driver in flight.
pub struct StatsCache {
    path: PathBuf,
    rows: Vec<DriverSessionStat>,
    seen: HashSet<(i64, u32)>,
}

impl StatsCache {
    /// Load the cache from disk, starting empty if the file is missing.
    /// The skip-set is rebuilt from the loaded rows.
    pub fn load(path: &Path) -> Result<Self> {
        let rows: Vec<DriverSessionStat> = load_or_empty(path)?;
        if rows.is_empty() {
            info!("No cache found at {}, starting empty", path.display());
        } else {
            info!("Loaded cache with {} rows", rows.len());
        }
        let seen = rows
            .iter()
            .map(|r| (r.session_key, r.driver_number))
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            rows,
            seen,
        })
    }

    /// Whether a (session_key, driver_number) pair is already cached.
    pub fn contains(&self, session_key: i64, driver_number: u32) -> bool {
        self.seen.contains(&(session_key, driver_number))
    }

    /// Append a completed row and rewrite the cache file.
    pub fn append(&mut self, row: DriverSessionStat) -> Result<()> {
        self.seen.insert((row.session_key, row.driver_number));
        self.rows.push(row);
        write(&self.path, &self.rows)
    }

    pub fn rows(&self) -> &[DriverSessionStat] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_stat(session_key: i64, driver_number: u32) -> DriverSessionStat {
        DriverSessionStat {
            season_year: 2024,
            race_number: 1,
            session_key,
            race_location: Some("Monza".to_string()),
            country: Some("Italy".to_string()),
            date: Utc.with_ymd_and_hms(2024, 9, 1, 13, 0, 0).unwrap(),
            driver_number,
            driver_name: Some("Max VERSTAPPEN".to_string()),
            broadcast_name: Some("M VERSTAPPEN".to_string()),
            team_name: Some("Red Bull Racing".to_string()),
            country_code: Some("NED".to_string()),
            best_lap_time: Some(82.5),
            avg_lap_time: Some(85.1),
            grid_position: Some(1),
            final_position: Some(1),
            position_change: Some(0),
        }
    }

    #[test]
    fn load_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatsCache::load(&dir.path().join("stats.csv")).unwrap();
        assert!(cache.is_empty());
        assert!(!cache.contains(9000, 1));
    }

    #[test]
    fn append_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");

        let mut cache = StatsCache::load(&path).unwrap();
        cache.append(sample_stat(9000, 1)).unwrap();
        cache.append(sample_stat(9000, 44)).unwrap();
        assert_eq!(cache.len(), 2);

        let reloaded = StatsCache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains(9000, 1));
        assert!(reloaded.contains(9000, 44));
        assert!(!reloaded.contains(9001, 1));
        assert_eq!(reloaded.rows()[0], sample_stat(9000, 1));
    }

    #[test]
    fn optional_fields_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");

        let mut stat = sample_stat(9000, 2);
        stat.best_lap_time = None;
        stat.avg_lap_time = None;
        stat.grid_position = None;
        stat.position_change = None;
        stat.team_name = None;

        let mut cache = StatsCache::load(&path).unwrap();
        cache.append(stat.clone()).unwrap();

        let reloaded = StatsCache::load(&path).unwrap();
        assert_eq!(reloaded.rows()[0], stat);
    }

    #[test]
    fn rewrite_is_deterministic_for_unchanged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");

        let mut cache = StatsCache::load(&path).unwrap();
        cache.append(sample_stat(9000, 1)).unwrap();
        let before = std::fs::read(&path).unwrap();

        // Reload and rewrite without touching the existing row.
        let mut cache = StatsCache::load(&path).unwrap();
        cache.append(sample_stat(9001, 1)).unwrap();
        let after = std::fs::read_to_string(&path).unwrap();
        let first_lines: Vec<&str> = after.lines().take(2).collect();
        let before_str = String::from_utf8(before).unwrap();
        assert_eq!(
            before_str.lines().collect::<Vec<_>>(),
            first_lines,
            "existing cached row changed on rewrite"
        );
    }
}
