//! Configuration for the pitwall pipeline.

use serde::{Deserialize, Serialize};

/// OpenF1 API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// First season to fetch; the loop runs through the current year.
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    /// Minimum delay enforced before every remote query, in seconds.
    #[serde(default = "default_request_delay_secs")]
    pub request_delay_secs: f64,
    /// Per-request timeout, in seconds. A timeout aborts the run.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    crate::openf1::BASE_URL.to_string()
}

fn default_start_year() -> i32 {
    2023
}

fn default_request_delay_secs() -> f64 {
    1.0
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            start_year: default_start_year(),
            request_delay_secs: default_request_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Locations of the persisted artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_driver_stats")]
    pub driver_stats: String,
    #[serde(default = "default_driver_perf")]
    pub driver_perf: String,
    #[serde(default = "default_fia_docs")]
    pub fia_docs: String,
    #[serde(default = "default_upgrades_file")]
    pub upgrades_file: String,
    #[serde(default = "default_report_file")]
    pub report_file: String,
    #[serde(default = "default_docs_dir")]
    pub docs_dir: String,
}

fn default_driver_stats() -> String {
    "data/f1_driver_stats.csv".to_string()
}

fn default_driver_perf() -> String {
    "data/f1_driver_perf.csv".to_string()
}

fn default_fia_docs() -> String {
    "data/fia_docs.csv".to_string()
}

fn default_upgrades_file() -> String {
    "data/2025_fia_car_presentations.xlsx".to_string()
}

fn default_report_file() -> String {
    "data/f1_driver_perf_upgrades.xlsx".to_string()
}

fn default_docs_dir() -> String {
    "fia_docs".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            driver_stats: default_driver_stats(),
            driver_perf: default_driver_perf(),
            fia_docs: default_fia_docs(),
            upgrades_file: default_upgrades_file(),
            report_file: default_report_file(),
            docs_dir: default_docs_dir(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional config file, and
    /// PITWALL_* environment variables. Nesting uses a double underscore,
    /// so `PITWALL_API__START_YEAR` overrides `api.start_year`.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("PITWALL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Metric weights for the combined ranking value.
///
/// Static configuration, not derived from data. Metrics listed here must
/// carry a score column in the scored table; score columns without a weight
/// are ignored.
pub const SCORE_WEIGHTS: [(&str, f64); 4] = [
    ("best_lap_time", 1.0),
    ("avg_lap_time", 1.0),
    ("position_change", 1.0),
    ("final_position", 2.0),
];
