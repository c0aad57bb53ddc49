//! Per-session metric normalization and weighted scoring.
//!
//! Each tracked metric is rescaled to [0,1] relative to the other drivers
//! in the same session, then the per-metric scores are combined into one
//! weighted ranking value.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::config::SCORE_WEIGHTS;
use crate::teams::{driver_surname, map_stats_team};
use crate::types::{DriverSessionStat, ScoredDriverStat};

/// Tracked metric with its scoring polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    BestLapTime,
    AvgLapTime,
    PositionChange,
    FinalPosition,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::BestLapTime,
        Metric::AvgLapTime,
        Metric::PositionChange,
        Metric::FinalPosition,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::BestLapTime => "best_lap_time",
            Metric::AvgLapTime => "avg_lap_time",
            Metric::PositionChange => "position_change",
            Metric::FinalPosition => "final_position",
        }
    }

    /// Whether larger raw values represent better performance.
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Metric::PositionChange)
    }

    /// Raw value of this metric for a row.
    pub fn value(&self, row: &DriverSessionStat) -> Option<f64> {
        match self {
            Metric::BestLapTime => row.best_lap_time,
            Metric::AvgLapTime => row.avg_lap_time,
            Metric::PositionChange => row.position_change.map(|v| v as f64),
            Metric::FinalPosition => row.final_position.map(|v| v as f64),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error(
        "expected exactly one row for session_key={session_key}, \
         driver_number={driver_number}, found {found}"
    )]
    RowLookup {
        session_key: i64,
        driver_number: u32,
        found: usize,
    },
    #[error("weighted metric '{0}' has no score column")]
    MissingScoreColumn(String),
}

/// Min/max of a metric within one session group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupBounds {
    pub min: f64,
    pub max: f64,
}

/// Per-session (min, max) of a metric, built once per normalization pass.
/// Rows whose raw value is absent do not contribute.
pub fn session_bounds(rows: &[DriverSessionStat], metric: Metric) -> HashMap<i64, GroupBounds> {
    let mut bounds: HashMap<i64, GroupBounds> = HashMap::new();
    for row in rows {
        let Some(value) = metric.value(row) else {
            continue;
        };
        bounds
            .entry(row.session_key)
            .and_modify(|b| {
                b.min = b.min.min(value);
                b.max = b.max.max(value);
            })
            .or_insert(GroupBounds {
                min: value,
                max: value,
            });
    }
    bounds
}

/// Rescale a raw value into [0,1] within its group bounds.
///
/// A degenerate group (all values equal, including groups of one) scores
/// 1.0 under a higher-is-better framing and 0.0 otherwise.
pub fn scale_within_bounds(value: f64, bounds: GroupBounds, higher_is_better: bool) -> f64 {
    if bounds.max == bounds.min {
        return if higher_is_better { 1.0 } else { 0.0 };
    }
    if higher_is_better {
        (value - bounds.min) / (bounds.max - bounds.min)
    } else {
        (bounds.max - value) / (bounds.max - bounds.min)
    }
}

/// Normalized score of one entity's metric within its session.
///
/// Pure over the dataset; fails when the (session_key, driver_number) pair
/// does not identify exactly one row.
pub fn normalized_position(
    rows: &[DriverSessionStat],
    session_key: i64,
    driver_number: u32,
    metric: Metric,
) -> Result<Option<f64>, ScoreError> {
    let matches: Vec<&DriverSessionStat> = rows
        .iter()
        .filter(|r| r.session_key == session_key && r.driver_number == driver_number)
        .collect();
    if matches.len() != 1 {
        return Err(ScoreError::RowLookup {
            session_key,
            driver_number,
            found: matches.len(),
        });
    }

    let Some(value) = metric.value(matches[0]) else {
        return Ok(None);
    };
    let bounds = session_bounds(rows, metric);
    // The row's own value is present, so its session has bounds.
    let group = bounds[&session_key];
    Ok(Some(scale_within_bounds(
        value,
        group,
        metric.higher_is_better(),
    )))
}

/// Combine named per-metric scores into the weighted ranking value.
///
/// Every weighted metric must be present in the score set; a weighted
/// metric whose score is absent for this row yields `None` overall.
pub fn weighted_score(
    scores: &HashMap<&str, Option<f64>>,
) -> Result<Option<f64>, ScoreError> {
    let mut total = 0.0;
    for (name, weight) in SCORE_WEIGHTS {
        let score = scores
            .get(name)
            .ok_or_else(|| ScoreError::MissingScoreColumn(name.to_string()))?;
        match score {
            Some(s) => total += weight * s,
            None => return Ok(None),
        }
    }
    Ok(Some(total))
}

/// Score every row of the stats table.
///
/// Precomputes per-session bounds for each metric, then derives the score
/// columns, the surname and canonical team name, and the weighted total.
/// Duplicate (session_key, driver_number) keys are fatal.
pub fn score_all(rows: &[DriverSessionStat]) -> Result<Vec<ScoredDriverStat>, ScoreError> {
    let mut seen: HashSet<(i64, u32)> = HashSet::new();
    for row in rows {
        if !seen.insert((row.session_key, row.driver_number)) {
            let found = rows
                .iter()
                .filter(|r| {
                    r.session_key == row.session_key && r.driver_number == row.driver_number
                })
                .count();
            return Err(ScoreError::RowLookup {
                session_key: row.session_key,
                driver_number: row.driver_number,
                found,
            });
        }
    }

    let bounds: HashMap<Metric, HashMap<i64, GroupBounds>> = Metric::ALL
        .iter()
        .map(|&m| (m, session_bounds(rows, m)))
        .collect();

    let score_for = |row: &DriverSessionStat, metric: Metric| -> Option<f64> {
        let value = metric.value(row)?;
        let group = bounds[&metric][&row.session_key];
        Some(scale_within_bounds(value, group, metric.higher_is_better()))
    };

    let mut scored = Vec::with_capacity(rows.len());
    for row in rows {
        let score_best_lap_time = score_for(row, Metric::BestLapTime);
        let score_avg_lap_time = score_for(row, Metric::AvgLapTime);
        let score_position_change = score_for(row, Metric::PositionChange);
        let score_final_position = score_for(row, Metric::FinalPosition);

        let scores: HashMap<&str, Option<f64>> = HashMap::from([
            (Metric::BestLapTime.name(), score_best_lap_time),
            (Metric::AvgLapTime.name(), score_avg_lap_time),
            (Metric::PositionChange.name(), score_position_change),
            (Metric::FinalPosition.name(), score_final_position),
        ]);
        let weighted = weighted_score(&scores)?;

        scored.push(ScoredDriverStat {
            season_year: row.season_year,
            race_number: row.race_number,
            session_key: row.session_key,
            race_location: row.race_location.clone(),
            country: row.country.clone(),
            date: row.date,
            driver_number: row.driver_number,
            driver_name: row.driver_name.clone(),
            driver_surname: row.driver_name.as_deref().and_then(driver_surname),
            broadcast_name: row.broadcast_name.clone(),
            team_name: row.team_name.clone(),
            team_name_mapped: row.team_name.as_deref().map(map_stats_team),
            country_code: row.country_code.clone(),
            best_lap_time: row.best_lap_time,
            avg_lap_time: row.avg_lap_time,
            grid_position: row.grid_position,
            final_position: row.final_position,
            position_change: row.position_change,
            score_best_lap_time,
            score_avg_lap_time,
            score_position_change,
            score_final_position,
            weighted_score: weighted,
        });
    }

    Ok(scored)
}
