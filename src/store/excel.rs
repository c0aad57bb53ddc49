//! Spreadsheet input/output: upgrade-disclosure ingest and the final report.

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tracing::info;

use crate::teams::map_upgrade_team;
use crate::types::{FinalReportRow, UpgradeEvent};

const COL_FILENAME: &str = "Filename";
const COL_TEAM_NAME: &str = "Team Name";
const COL_REASON: &str = "Primary reason for update";

fn cell_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        other => Some(other.to_string()),
    }
}

/// Read the upgrade-events workbook (first sheet), canonicalizing team
/// names on the way in. Rows without a filename or team name are skipped,
/// as they cannot participate in any grouping key.
pub fn read_upgrade_events(path: &Path) -> Result<Vec<UpgradeEvent>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .context("Workbook has no sheets")?
        .context("Failed to read first sheet")?;

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(h) => h,
        None => bail!("Upgrade workbook is empty"),
    };

    let find_col = |name: &str| -> Result<usize> {
        header
            .iter()
            .position(|c| cell_string(c).as_deref() == Some(name))
            .with_context(|| format!("Missing required column '{}'", name))
    };

    let filename_idx = find_col(COL_FILENAME)?;
    let team_idx = find_col(COL_TEAM_NAME)?;
    let reason_idx = find_col(COL_REASON)?;

    let mut events = Vec::new();
    for row in rows {
        let filename = row.get(filename_idx).and_then(cell_string);
        let team_name = row.get(team_idx).and_then(cell_string);
        let reason = row.get(reason_idx).and_then(cell_string);

        let (Some(filename), Some(team_name)) = (filename, team_name) else {
            continue;
        };

        events.push(UpgradeEvent {
            filename,
            team_name_mapped: map_upgrade_team(&team_name),
            reason,
        });
    }

    info!("Loaded {} upgrade rows from {}", events.len(), path.display());
    Ok(events)
}

const REPORT_HEADERS: [&str; 26] = [
    "season_year",
    "race_number",
    "session_key",
    "race_location",
    "country",
    "date",
    "driver_number",
    "driver_name",
    "driver_surname",
    "broadcast_name",
    "team_name",
    "team_name_mapped",
    "country_code",
    "best_lap_time",
    "avg_lap_time",
    "grid_position",
    "final_position",
    "position_change",
    "score_best_lap_time",
    "score_avg_lap_time",
    "score_position_change",
    "score_final_position",
    "weighted_score",
    "upgrade_filename",
    "upgrade_count",
    "circuit_specific_any",
];

/// Write the final report as a single-sheet workbook, one row per scored
/// driver stat. Missing join values are left as blank cells.
pub fn write_report(path: &Path, rows: &[FinalReportRow]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in REPORT_HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        let mut c: u16 = 0;
        let mut write_num = |sheet: &mut rust_xlsxwriter::Worksheet,
                             col: &mut u16,
                             value: Option<f64>|
         -> Result<()> {
            if let Some(v) = value {
                sheet.write_number(r, *col, v)?;
            }
            *col += 1;
            Ok(())
        };

        sheet.write_number(r, c, row.season_year as f64)?;
        c += 1;
        sheet.write_number(r, c, row.race_number as f64)?;
        c += 1;
        sheet.write_number(r, c, row.session_key as f64)?;
        c += 1;
        if let Some(v) = &row.race_location {
            sheet.write_string(r, c, v)?;
        }
        c += 1;
        if let Some(v) = &row.country {
            sheet.write_string(r, c, v)?;
        }
        c += 1;
        sheet.write_string(r, c, &row.date.to_rfc3339())?;
        c += 1;
        sheet.write_number(r, c, row.driver_number as f64)?;
        c += 1;
        if let Some(v) = &row.driver_name {
            sheet.write_string(r, c, v)?;
        }
        c += 1;
        if let Some(v) = &row.driver_surname {
            sheet.write_string(r, c, v)?;
        }
        c += 1;
        if let Some(v) = &row.broadcast_name {
            sheet.write_string(r, c, v)?;
        }
        c += 1;
        if let Some(v) = &row.team_name {
            sheet.write_string(r, c, v)?;
        }
        c += 1;
        if let Some(v) = &row.team_name_mapped {
            sheet.write_string(r, c, v)?;
        }
        c += 1;
        if let Some(v) = &row.country_code {
            sheet.write_string(r, c, v)?;
        }
        c += 1;
        write_num(sheet, &mut c, row.best_lap_time)?;
        write_num(sheet, &mut c, row.avg_lap_time)?;
        write_num(sheet, &mut c, row.grid_position.map(|v| v as f64))?;
        write_num(sheet, &mut c, row.final_position.map(|v| v as f64))?;
        write_num(sheet, &mut c, row.position_change.map(|v| v as f64))?;
        write_num(sheet, &mut c, row.score_best_lap_time)?;
        write_num(sheet, &mut c, row.score_avg_lap_time)?;
        write_num(sheet, &mut c, row.score_position_change)?;
        write_num(sheet, &mut c, row.score_final_position)?;
        write_num(sheet, &mut c, row.weighted_score)?;
        if let Some(v) = &row.upgrade_filename {
            sheet.write_string(r, c, v)?;
        }
        c += 1;
        write_num(sheet, &mut c, row.upgrade_count.map(|v| v as f64))?;
        if let Some(v) = row.circuit_specific_any {
            sheet.write_boolean(r, c, v)?;
        }
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    workbook.save(path)?;
    info!("Report written to {} ({} rows)", path.display(), rows.len());
    Ok(())
}
