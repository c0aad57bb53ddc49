//! Client for the OpenF1 public API.
//!
//! Covers the four query endpoints the pipeline consumes: sessions,
//! drivers, laps, and position history. Every request passes through the
//! rate limiter first; any transport failure, timeout, or non-2xx response
//! is fatal to the current run; there is no retry, the next run resumes
//! from the cache.

pub mod rate_limiter;

pub use rate_limiter::RateLimiter;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

/// Default base URL for api.openf1.org
pub const BASE_URL: &str = "https://api.openf1.org/v1";

/// Session type queried from the sessions endpoint. Only races are scored.
pub const SESSION_TYPE_RACE: &str = "Race";

/// Session descriptor from the /sessions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSession {
    pub session_key: i64,
    pub year: i32,
    pub country_name: Option<String>,
    pub location: Option<String>,
    pub date_start: DateTime<Utc>,
}

/// Driver roster entry from the /drivers endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiDriver {
    pub driver_number: u32,
    pub full_name: Option<String>,
    pub broadcast_name: Option<String>,
    pub team_name: Option<String>,
    pub country_code: Option<String>,
}

/// Lap record from the /laps endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiLap {
    pub lap_duration: Option<f64>,
}

/// Position record from the /position endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPosition {
    pub date: DateTime<Utc>,
    pub position: Option<i64>,
}

/// Query contract of the remote session data source.
///
/// The fetch loop is generic over this trait so tests can substitute a
/// scripted source.
#[allow(async_fn_in_trait)]
pub trait SessionSource {
    async fn list_sessions(&self, year: i32) -> Result<Vec<ApiSession>>;
    async fn list_drivers(&self, session_key: i64) -> Result<Vec<ApiDriver>>;
    async fn list_laps(&self, session_key: i64, driver_number: u32) -> Result<Vec<ApiLap>>;
    async fn list_positions(&self, session_key: i64, driver_number: u32)
        -> Result<Vec<ApiPosition>>;
}

/// HTTP client for the OpenF1 API.
pub struct OpenF1Client {
    http: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl OpenF1Client {
    /// Create a client with the given base URL, per-request delay, and
    /// per-request timeout.
    pub fn new(base_url: &str, request_delay_secs: f64, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(request_delay_secs),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        self.limiter.acquire().await;

        let url = format!("{}/{}", self.base_url, endpoint);
        info!("API call: {} | params: {:?}", url, params);

        let resp = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Request to {} returned an error status", url))?;

        let data: Vec<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to decode response from {}", url))?;

        info!("Entries returned: {}", data.len());
        Ok(data)
    }
}

impl SessionSource for OpenF1Client {
    async fn list_sessions(&self, year: i32) -> Result<Vec<ApiSession>> {
        self.get_json(
            "sessions",
            &[
                ("year", year.to_string()),
                ("session_type", SESSION_TYPE_RACE.to_string()),
            ],
        )
        .await
    }

    async fn list_drivers(&self, session_key: i64) -> Result<Vec<ApiDriver>> {
        self.get_json("drivers", &[("session_key", session_key.to_string())])
            .await
    }

    async fn list_laps(&self, session_key: i64, driver_number: u32) -> Result<Vec<ApiLap>> {
        self.get_json(
            "laps",
            &[
                ("session_key", session_key.to_string()),
                ("driver_number", driver_number.to_string()),
            ],
        )
        .await
    }

    async fn list_positions(
        &self,
        session_key: i64,
        driver_number: u32,
    ) -> Result<Vec<ApiPosition>> {
        self.get_json(
            "position",
            &[
                ("session_key", session_key.to_string()),
                ("driver_number", driver_number.to_string()),
            ],
        )
        .await
    }
}
