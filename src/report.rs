//! Join pipeline: upgrade summaries × curated documents × scored stats.
//!
//! Every merge step is a left join that must preserve the driving table's
//! row count exactly. A changed count means a join key that was assumed
//! unique is not, which would silently duplicate report rows, so it aborts
//! the run instead of being logged and tolerated.

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::info;

use crate::types::{FiaDocument, FinalReportRow, ScoredDriverStat, UpgradeEvent, UpgradeSummary};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("row count changed after {stage} merge: {before} -> {after}")]
    RowCountMismatch {
        stage: &'static str,
        before: usize,
        after: usize,
    },
}

const CIRCUIT_SPECIFIC: &str = "circuit specific";

/// Aggregate raw upgrade rows per (filename, team).
///
/// `circuit_specific_any` is a logical OR over the group's free-text
/// reasons, not a count. Output is ordered by the grouping key.
pub fn group_upgrades(events: &[UpgradeEvent]) -> Vec<UpgradeSummary> {
    let mut groups: BTreeMap<(String, String), (u64, bool)> = BTreeMap::new();
    for event in events {
        let key = (event.filename.clone(), event.team_name_mapped.clone());
        let entry = groups.entry(key).or_insert((0, false));
        entry.0 += 1;
        if let Some(reason) = &event.reason {
            if reason.to_lowercase().contains(CIRCUIT_SPECIFIC) {
                entry.1 = true;
            }
        }
    }

    groups
        .into_iter()
        .map(
            |((filename, team_name_mapped), (upgrade_count, circuit_specific_any))| {
                UpgradeSummary {
                    filename,
                    team_name_mapped,
                    upgrade_count,
                    circuit_specific_any,
                }
            },
        )
        .collect()
}

/// Upgrade summary with the race reference attached where a curated
/// document matched its filename.
#[derive(Debug, Clone)]
pub struct UpgradeDocRow {
    pub filename: String,
    pub team_name_mapped: String,
    pub upgrade_count: u64,
    pub circuit_specific_any: bool,
    pub season: Option<i32>,
    pub race_number: Option<u32>,
}

/// Left-join upgrade summaries to curated documents on filename.
///
/// A filename appearing on more than one document would fan rows out; the
/// post-join count assertion turns that into a fatal error.
pub fn join_docs(
    summaries: Vec<UpgradeSummary>,
    docs: &[FiaDocument],
) -> Result<Vec<UpgradeDocRow>, ReportError> {
    let mut by_filename: HashMap<&str, Vec<&FiaDocument>> = HashMap::new();
    for doc in docs {
        by_filename.entry(doc.filename()).or_default().push(doc);
    }

    let before = summaries.len();
    let mut joined = Vec::with_capacity(before);
    for summary in summaries {
        match by_filename.get(summary.filename.as_str()) {
            Some(matches) => {
                for doc in matches {
                    joined.push(UpgradeDocRow {
                        filename: summary.filename.clone(),
                        team_name_mapped: summary.team_name_mapped.clone(),
                        upgrade_count: summary.upgrade_count,
                        circuit_specific_any: summary.circuit_specific_any,
                        season: Some(doc.season),
                        race_number: Some(doc.race_number),
                    });
                }
            }
            None => joined.push(UpgradeDocRow {
                filename: summary.filename,
                team_name_mapped: summary.team_name_mapped,
                upgrade_count: summary.upgrade_count,
                circuit_specific_any: summary.circuit_specific_any,
                season: None,
                race_number: None,
            }),
        }
    }

    if joined.len() != before {
        return Err(ReportError::RowCountMismatch {
            stage: "document",
            before,
            after: joined.len(),
        });
    }
    Ok(joined)
}

/// Left-join scored driver stats to the upgrade rows on
/// (season_year, race_number, team_name_mapped).
///
/// Every scored row survives; non-matches carry empty upgrade columns.
pub fn join_performance(
    scored: &[ScoredDriverStat],
    upgrades: &[UpgradeDocRow],
) -> Result<Vec<FinalReportRow>, ReportError> {
    let mut by_race_team: HashMap<(i32, u32, &str), Vec<&UpgradeDocRow>> = HashMap::new();
    for row in upgrades {
        if let (Some(season), Some(race_number)) = (row.season, row.race_number) {
            by_race_team
                .entry((season, race_number, row.team_name_mapped.as_str()))
                .or_default()
                .push(row);
        }
    }

    let before = scored.len();
    let mut report = Vec::with_capacity(before);
    for stat in scored {
        let matches = stat
            .team_name_mapped
            .as_deref()
            .and_then(|team| by_race_team.get(&(stat.season_year, stat.race_number, team)));

        match matches {
            Some(rows) => {
                for upgrade in rows {
                    report.push(report_row(stat, Some(upgrade)));
                }
            }
            None => report.push(report_row(stat, None)),
        }
    }

    if report.len() != before {
        return Err(ReportError::RowCountMismatch {
            stage: "performance",
            before,
            after: report.len(),
        });
    }
    Ok(report)
}

fn report_row(stat: &ScoredDriverStat, upgrade: Option<&UpgradeDocRow>) -> FinalReportRow {
    FinalReportRow {
        season_year: stat.season_year,
        race_number: stat.race_number,
        session_key: stat.session_key,
        race_location: stat.race_location.clone(),
        country: stat.country.clone(),
        date: stat.date,
        driver_number: stat.driver_number,
        driver_name: stat.driver_name.clone(),
        driver_surname: stat.driver_surname.clone(),
        broadcast_name: stat.broadcast_name.clone(),
        team_name: stat.team_name.clone(),
        team_name_mapped: stat.team_name_mapped.clone(),
        country_code: stat.country_code.clone(),
        best_lap_time: stat.best_lap_time,
        avg_lap_time: stat.avg_lap_time,
        grid_position: stat.grid_position,
        final_position: stat.final_position,
        position_change: stat.position_change,
        score_best_lap_time: stat.score_best_lap_time,
        score_avg_lap_time: stat.score_avg_lap_time,
        score_position_change: stat.score_position_change,
        score_final_position: stat.score_final_position,
        weighted_score: stat.weighted_score,
        upgrade_filename: upgrade.map(|u| u.filename.clone()),
        upgrade_count: upgrade.map(|u| u.upgrade_count),
        circuit_specific_any: upgrade.map(|u| u.circuit_specific_any),
    }
}

/// Run the full pipeline: group, join documents, join performance.
pub fn build_report(
    scored: &[ScoredDriverStat],
    events: &[UpgradeEvent],
    docs: &[FiaDocument],
) -> Result<Vec<FinalReportRow>, ReportError> {
    let summaries = group_upgrades(events);
    info!("Grouped {} upgrade rows into {} summaries", events.len(), summaries.len());

    let upgrade_rows = join_docs(summaries, docs)?;
    info!("Joined upgrade summaries to {} curated documents", docs.len());

    let report = join_performance(scored, &upgrade_rows)?;
    info!("Final report has {} rows", report.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(filename: &str, team: &str, reason: Option<&str>) -> UpgradeEvent {
        UpgradeEvent {
            filename: filename.to_string(),
            team_name_mapped: team.to_string(),
            reason: reason.map(|r| r.to_string()),
        }
    }

    fn doc(season: i32, race_number: u32, filename: &str) -> FiaDocument {
        FiaDocument {
            season,
            race_number,
            pdf_url: format!("https://example.org/docs/{}", filename),
        }
    }

    fn scored(season: i32, race: u32, driver: u32, team: Option<&str>) -> ScoredDriverStat {
        ScoredDriverStat {
            season_year: season,
            race_number: race,
            session_key: 9000 + race as i64,
            race_location: None,
            country: None,
            date: Utc.with_ymd_and_hms(season, 3, 1, 13, 0, 0).unwrap(),
            driver_number: driver,
            driver_name: None,
            driver_surname: None,
            broadcast_name: Some(format!("DRIVER {}", driver)),
            team_name: team.map(|t| t.to_string()),
            team_name_mapped: team.map(|t| t.to_string()),
            country_code: Some("NED".to_string()),
            best_lap_time: Some(90.0),
            avg_lap_time: Some(92.0),
            grid_position: Some(3),
            final_position: Some(1),
            position_change: Some(2),
            score_best_lap_time: Some(1.0),
            score_avg_lap_time: Some(1.0),
            score_position_change: Some(1.0),
            score_final_position: Some(1.0),
            weighted_score: Some(5.0),
        }
    }

    #[test]
    fn grouping_counts_rows_and_ors_reasons() {
        let events = vec![
            event("doc_01.pdf", "McLaren", Some("Performance")),
            event("doc_01.pdf", "McLaren", Some("CIRCUIT SPECIFIC cooling")),
            event("doc_01.pdf", "Ferrari", Some("Performance")),
            event("doc_02.pdf", "McLaren", None),
        ];
        let summaries = group_upgrades(&events);
        assert_eq!(summaries.len(), 3);

        let mclaren_doc1 = summaries
            .iter()
            .find(|s| s.filename == "doc_01.pdf" && s.team_name_mapped == "McLaren")
            .unwrap();
        assert_eq!(mclaren_doc1.upgrade_count, 2);
        assert!(mclaren_doc1.circuit_specific_any);

        let ferrari_doc1 = summaries
            .iter()
            .find(|s| s.filename == "doc_01.pdf" && s.team_name_mapped == "Ferrari")
            .unwrap();
        assert_eq!(ferrari_doc1.upgrade_count, 1);
        assert!(!ferrari_doc1.circuit_specific_any);
    }

    #[test]
    fn doc_join_preserves_row_count() {
        let summaries: Vec<UpgradeSummary> = (0..10)
            .map(|i| UpgradeSummary {
                filename: format!("doc_{:02}.pdf", i % 5),
                team_name_mapped: format!("Team {}", i),
                upgrade_count: 1,
                circuit_specific_any: false,
            })
            .collect();
        let docs: Vec<FiaDocument> = (0..5)
            .map(|i| doc(2025, i + 1, &format!("doc_{:02}.pdf", i)))
            .collect();

        let joined = join_docs(summaries, &docs).unwrap();
        assert_eq!(joined.len(), 10);
        assert!(joined.iter().all(|r| r.season == Some(2025)));
    }

    #[test]
    fn duplicate_document_filename_aborts() {
        let summaries = vec![UpgradeSummary {
            filename: "doc_00.pdf".to_string(),
            team_name_mapped: "McLaren".to_string(),
            upgrade_count: 3,
            circuit_specific_any: false,
        }];
        let docs = vec![doc(2025, 1, "doc_00.pdf"), doc(2025, 2, "doc_00.pdf")];

        let err = join_docs(summaries, &docs).unwrap_err();
        assert!(matches!(
            err,
            ReportError::RowCountMismatch { stage: "document", before: 1, after: 2 }
        ));
    }

    #[test]
    fn unmatched_summary_keeps_row_with_empty_reference() {
        let summaries = vec![UpgradeSummary {
            filename: "unknown.pdf".to_string(),
            team_name_mapped: "McLaren".to_string(),
            upgrade_count: 1,
            circuit_specific_any: true,
        }];
        let joined = join_docs(summaries, &[]).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].season, None);
        assert_eq!(joined[0].race_number, None);
    }

    #[test]
    fn performance_join_is_left_preserving() {
        let stats = vec![
            scored(2025, 1, 4, Some("McLaren")),
            scored(2025, 1, 81, Some("McLaren")),
            scored(2025, 1, 44, Some("Ferrari")),
            scored(2025, 2, 4, Some("McLaren")),
            scored(2025, 1, 99, None),
        ];
        let upgrades = vec![UpgradeDocRow {
            filename: "doc_01.pdf".to_string(),
            team_name_mapped: "McLaren".to_string(),
            upgrade_count: 3,
            circuit_specific_any: true,
            season: Some(2025),
            race_number: Some(1),
        }];

        let report = join_performance(&stats, &upgrades).unwrap();
        assert_eq!(report.len(), 5);

        // Both McLaren drivers at race 1 match.
        let matched: Vec<&FinalReportRow> = report
            .iter()
            .filter(|r| r.upgrade_count.is_some())
            .collect();
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|r| r.upgrade_count == Some(3)));
        assert!(matched.iter().all(|r| r.circuit_specific_any == Some(true)));

        // Non-matches survive with empty upgrade columns.
        let ferrari = report.iter().find(|r| r.driver_number == 44).unwrap();
        assert_eq!(ferrari.upgrade_count, None);
        assert_eq!(ferrari.upgrade_filename, None);
        let unmapped = report.iter().find(|r| r.driver_number == 99).unwrap();
        assert_eq!(unmapped.upgrade_count, None);
    }

    #[test]
    fn report_rows_carry_every_scored_column() {
        // Identity columns not involved in any join key still survive.
        let stats = vec![scored(2025, 1, 4, Some("McLaren"))];
        let report = join_performance(&stats, &[]).unwrap();
        assert_eq!(report[0].broadcast_name.as_deref(), Some("DRIVER 4"));
        assert_eq!(report[0].country_code.as_deref(), Some("NED"));
        assert_eq!(report[0].driver_number, 4);
    }

    #[test]
    fn duplicate_upgrade_key_aborts_performance_join() {
        let stats = vec![scored(2025, 1, 4, Some("McLaren"))];
        let dup = UpgradeDocRow {
            filename: "doc_01.pdf".to_string(),
            team_name_mapped: "McLaren".to_string(),
            upgrade_count: 1,
            circuit_specific_any: false,
            season: Some(2025),
            race_number: Some(1),
        };
        let upgrades = vec![dup.clone(), dup];

        let err = join_performance(&stats, &upgrades).unwrap_err();
        assert!(matches!(
            err,
            ReportError::RowCountMismatch { stage: "performance", before: 1, after: 2 }
        ));
    }

    #[test]
    fn full_pipeline_produces_report_rows() {
        let stats = vec![scored(2025, 1, 4, Some("McLaren"))];
        let events = vec![
            event("doc_01.pdf", "McLaren", Some("circuit specific wing")),
            event("doc_01.pdf", "McLaren", Some("Performance")),
        ];
        let docs = vec![doc(2025, 1, "doc_01.pdf")];

        let report = build_report(&stats, &events, &docs).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].upgrade_count, Some(2));
        assert_eq!(report[0].circuit_specific_any, Some(true));
        assert_eq!(report[0].upgrade_filename.as_deref(), Some("doc_01.pdf"));
    }
}
