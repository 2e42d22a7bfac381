//! Condensing a slave run into one row of six cells.
//!
//! [`summarize`] is the only place where cell values are derived; the CSV,
//! text and HTML renderers all start from the [`SlaveSummary`] it returns.

use std::fmt;

use chrono::NaiveDateTime;
use nb_io::Runner;
use tracing::error;

use crate::{pass::PassKind, store::ResultStore};

/// State of one cell of the result matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellStatus {
    /// The pass was not configured or was gated off.
    Disabled,
    Success,
    Failure,
    /// The slave's summary never arrived or could not be read.
    Lost,
}

impl CellStatus {
    /// Code used in `report.csv`. Lost is never written.
    pub fn code(&self) -> Option<i32> {
        match self {
            CellStatus::Disabled => Some(-1),
            CellStatus::Success => Some(0),
            CellStatus::Failure => Some(1),
            CellStatus::Lost => None,
        }
    }

    pub fn from_code(code: &str) -> Option<CellStatus> {
        match code.trim() {
            "-1" => Some(CellStatus::Disabled),
            "0" => Some(CellStatus::Success),
            "1" => Some(CellStatus::Failure),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CellStatus::Disabled => "Disabled",
            CellStatus::Success => "Success",
            CellStatus::Failure => "Failure",
            CellStatus::Lost => "Lost",
        }
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The machine a slave run happened on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    /// Operating system, release and architecture.
    pub platform: String,
    /// Version line of the C compiler.
    pub toolchain: String,
}

impl HostInfo {
    /// Ask the system once, so that rendering never runs commands.
    pub fn capture(cc: &str) -> Self {
        let platform = Runner::new("uname", vec!["-srmp"]).output();
        let toolchain = Runner::new(cc, vec!["-v"]).output();
        Self {
            platform: platform.stdout.first().cloned().unwrap_or_default(),
            toolchain: toolchain
                .lines()
                .find(|line| line.contains(" ver"))
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Identity and timing of a slave run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub config_name: String,
    pub slave_name: String,
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
    pub host: HostInfo,
}

/// Everything the reports show in their header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveSummary {
    pub context: ReportContext,
    pub cells: [CellStatus; 6],
}

impl SlaveSummary {
    pub fn cell(&self, kind: PassKind) -> CellStatus {
        self.cells[kind.column()]
    }
}

/// Derive the six cells of a slave run.
///
/// * no Build result: every cell is Failure,
/// * failed Build: Build is Failure and every test pass Disabled,
/// * otherwise a pass is Disabled when absent, else Success or Failure.
pub fn summarize(store: &ResultStore, context: &ReportContext) -> SlaveSummary {
    let cells = match store.get(PassKind::Build) {
        None => {
            error!(
                "{} - {} - Build result missing, reporting every pass as failed",
                context.config_name, context.slave_name
            );
            [CellStatus::Failure; 6]
        }
        Some(build) if !build.succeeded() => {
            let mut cells = [CellStatus::Disabled; 6];
            cells[PassKind::Build.column()] = CellStatus::Failure;
            cells
        }
        Some(_) => PassKind::ALL.map(|kind| match store.get(kind) {
            None => CellStatus::Disabled,
            Some(result) if result.succeeded() => CellStatus::Success,
            Some(_) => CellStatus::Failure,
        }),
    };
    SlaveSummary {
        context: context.clone(),
        cells,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::pass::fixtures::at;

    pub fn context() -> ReportContext {
        ReportContext {
            config_name: String::from("linux_gcc"),
            slave_name: String::from("lab1"),
            begin: at(1, 0),
            end: at(3, 15),
            host: HostInfo {
                platform: String::from("Linux 6.1.0 x86_64 unknown"),
                toolchain: String::from("gcc version 12.2.0 (Debian 12.2.0-14)"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fixtures::context, *};
    use crate::pass::fixtures::*;

    #[test]
    fn test_missing_build_is_all_failure() {
        let store = ResultStore::default();
        let summary = summarize(&store, &context());
        assert_eq!(summary.cells, [CellStatus::Failure; 6]);
    }

    #[test]
    fn test_failed_build_disables_tests() {
        let mut store = ResultStore::default();
        store.record(build(failed("make")));
        store.record(regression(true));
        let summary = summarize(&store, &context());
        assert_eq!(summary.cell(PassKind::Build), CellStatus::Failure);
        for kind in &PassKind::ALL[1..] {
            assert_eq!(summary.cell(*kind), CellStatus::Disabled);
        }
    }

    #[test]
    fn test_each_cell_has_exactly_one_state() {
        let mut store = ResultStore::default();
        store.record(build(ok("make")));
        store.record(regression(true));
        store.record(function(false));
        let summary = summarize(&store, &context());
        assert_eq!(
            summary.cells,
            [
                CellStatus::Success,
                CellStatus::Success,
                CellStatus::Disabled,
                CellStatus::Failure,
                CellStatus::Disabled,
                CellStatus::Disabled,
            ]
        );
        assert!(summary.cells.iter().all(|cell| *cell != CellStatus::Lost));
    }

    #[test]
    fn test_codes() {
        for cell in [CellStatus::Disabled, CellStatus::Success, CellStatus::Failure] {
            let code = cell.code().expect("Written cells have a code").to_string();
            assert_eq!(CellStatus::from_code(&code), Some(cell));
        }
        assert_eq!(CellStatus::Lost.code(), None);
        assert_eq!(CellStatus::from_code("2"), None);
    }
}
