//! Record types for the cached tables and the final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One competitive session (a race), after per-season dedupe and numbering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub season_year: i32,
    /// Locally-assigned sequence number within the season, starting at 1.
    pub race_number: u32,
    pub session_key: i64,
    pub location: Option<String>,
    pub country: Option<String>,
    pub date_start: DateTime<Utc>,
}

/// One row per (session_key, driver_number) in the driver-stats cache.
///
/// Unique on (session_key, driver_number); once written, a row is never
/// re-fetched or overwritten by a later run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSessionStat {
    pub season_year: i32,
    pub race_number: u32,
    pub session_key: i64,
    pub race_location: Option<String>,
    pub country: Option<String>,
    pub date: DateTime<Utc>,
    pub driver_number: u32,
    pub driver_name: Option<String>,
    pub broadcast_name: Option<String>,
    pub team_name: Option<String>,
    pub country_code: Option<String>,
    pub best_lap_time: Option<f64>,
    pub avg_lap_time: Option<f64>,
    pub grid_position: Option<i64>,
    pub final_position: Option<i64>,
    pub position_change: Option<i64>,
}

/// DriverSessionStat extended with normalized scores and the weighted total.
///
/// Regenerated in full on every `score` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDriverStat {
    pub season_year: i32,
    pub race_number: u32,
    pub session_key: i64,
    pub race_location: Option<String>,
    pub country: Option<String>,
    pub date: DateTime<Utc>,
    pub driver_number: u32,
    pub driver_name: Option<String>,
    pub driver_surname: Option<String>,
    pub broadcast_name: Option<String>,
    pub team_name: Option<String>,
    pub team_name_mapped: Option<String>,
    pub country_code: Option<String>,
    pub best_lap_time: Option<f64>,
    pub avg_lap_time: Option<f64>,
    pub grid_position: Option<i64>,
    pub final_position: Option<i64>,
    pub position_change: Option<i64>,
    pub score_best_lap_time: Option<f64>,
    pub score_avg_lap_time: Option<f64>,
    pub score_position_change: Option<f64>,
    pub score_final_position: Option<f64>,
    pub weighted_score: Option<f64>,
}

/// Raw upgrade record read from the disclosures workbook, with the team
/// name already canonicalized.
#[derive(Debug, Clone)]
pub struct UpgradeEvent {
    pub filename: String,
    pub team_name_mapped: String,
    pub reason: Option<String>,
}

/// UpgradeEvent rows aggregated per (filename, team).
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeSummary {
    pub filename: String,
    pub team_name_mapped: String,
    pub upgrade_count: u64,
    pub circuit_specific_any: bool,
}

/// Manually curated reference tying a published document to a race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiaDocument {
    pub season: i32,
    pub race_number: u32,
    pub pdf_url: String,
}

impl FiaDocument {
    /// Basename of the document URL, used as the join key against upgrades.
    pub fn filename(&self) -> &str {
        self.pdf_url.rsplit('/').next().unwrap_or(&self.pdf_url)
    }
}

/// One row of the final report: a scored driver stat with the upgrade
/// columns attached where a match exists.
#[derive(Debug, Clone, Serialize)]
pub struct FinalReportRow {
    pub season_year: i32,
    pub race_number: u32,
    pub session_key: i64,
    pub race_location: Option<String>,
    pub country: Option<String>,
    pub date: DateTime<Utc>,
    pub driver_number: u32,
    pub driver_name: Option<String>,
    pub driver_surname: Option<String>,
    pub broadcast_name: Option<String>,
    pub team_name: Option<String>,
    pub team_name_mapped: Option<String>,
    pub country_code: Option<String>,
    pub best_lap_time: Option<f64>,
    pub avg_lap_time: Option<f64>,
    pub grid_position: Option<i64>,
    pub final_position: Option<i64>,
    pub position_change: Option<i64>,
    pub score_best_lap_time: Option<f64>,
    pub score_avg_lap_time: Option<f64>,
    pub score_position_change: Option<f64>,
    pub score_final_position: Option<f64>,
    pub weighted_score: Option<f64>,
    pub upgrade_filename: Option<String>,
    pub upgrade_count: Option<u64>,
    pub circuit_specific_any: Option<bool>,
}
