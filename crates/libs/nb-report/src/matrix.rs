//! Aggregating the per-slave summaries of a cycle into the result matrix.

use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::{pass::PassKind, render::table::text_table, summary::CellStatus};

/// Number of comma separated fields of a `report.csv` line.
pub const CSV_FIELDS: usize = 6 + PassKind::ALL.len();

/// A (slave, configuration) pair the master distributed work for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveRun {
    pub slave_name: String,
    pub config_name: String,
}

impl SlaveRun {
    pub fn new(slave_name: impl Into<String>, config_name: impl Into<String>) -> Self {
        Self {
            slave_name: slave_name.into(),
            config_name: config_name.into(),
        }
    }

    /// Where the master keeps what it collected from this run.
    pub fn log_dir(&self, log_root: &Path) -> PathBuf {
        log_root.join(&self.config_name).join(&self.slave_name)
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.slave_name, self.config_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub run: SlaveRun,
    pub cells: [CellStatus; 6],
}

impl MatrixRow {
    pub fn is_lost(&self) -> bool {
        self.cells.iter().all(|cell| *cell == CellStatus::Lost)
    }
}

/// One row per slave run of the cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportMatrix {
    pub rows: Vec<MatrixRow>,
}

impl ReportMatrix {
    /// The matrix as a plain text table.
    pub fn to_table(&self) -> String {
        let mut headers = vec!["Slave/Action"];
        headers.extend(PassKind::ALL.iter().map(PassKind::title));
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = vec![row.run.label()];
                cells.extend(row.cells.iter().map(ToString::to_string));
                cells
            })
            .collect();
        text_table(&headers, &rows)
    }
}

/// Parse the content of a `report.csv` into its six cells.
///
/// Anything but exactly one line of [`CSV_FIELDS`] fields with known codes
/// is rejected.
pub fn parse_summary(content: &str) -> Option<[CellStatus; 6]> {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let [line] = lines.as_slice() else {
        return None;
    };
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != CSV_FIELDS {
        return None;
    }
    let mut cells = [CellStatus::Lost; 6];
    for (cell, code) in cells.iter_mut().zip(&fields[6..]) {
        *cell = CellStatus::from_code(code)?;
    }
    Some(cells)
}

/// Read the summary of every slave run below `log_root`.
///
/// A run whose `report.csv` is absent or malformed becomes a Lost row.
pub fn aggregate(log_root: &Path, runs: &[SlaveRun]) -> ReportMatrix {
    let rows = runs
        .iter()
        .map(|run| {
            let path = run.log_dir(log_root).join("report.csv");
            let cells = match std::fs::read_to_string(&path) {
                Ok(content) => parse_summary(&content).unwrap_or_else(|| {
                    error!("{} - Malformed summary {}", run.label(), path.display());
                    [CellStatus::Lost; 6]
                }),
                Err(err) => {
                    warn!("{} - Summary {} lost - {err}", run.label(), path.display());
                    [CellStatus::Lost; 6]
                }
            };
            MatrixRow {
                run: run.clone(),
                cells,
            }
        })
        .collect();
    ReportMatrix { rows }
}
