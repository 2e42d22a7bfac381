//! The commitment score: how often measured configurations come out clean.
//!
//! The state lives in the statistics block of the previous cycle's
//! `report.txt`; there is no other persistence.

use std::{fmt::Write, fs, path::Path, sync::LazyLock};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::{
    pass::{PassKind, TIMESTAMP_FORMAT},
    site::list_build_dirs,
    summary::CellStatus,
};

static FIRST_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^First period: (.+)$").expect("Valid regex"));
static OVERALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Overall score: (\d+)/(\d+)").expect("Valid regex"));
static THIS_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^This period: (.+)$").expect("Valid regex"));
static PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Period score: (\d+)/(\d+)").expect("Valid regex"));

/// Points a measured configuration can earn per cycle.
pub const POINTS_PER_CYCLE: u32 = 2;

/// Points kept by a measured configuration whose slave was lost.
pub const LOST_POINTS: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub score: u32,
    pub maximum: u32,
}

impl Tally {
    pub fn percentage(&self) -> f64 {
        if self.maximum == 0 {
            return 0.0;
        }
        f64::from(self.score) * 100.0 / f64::from(self.maximum)
    }

    fn credit(&mut self, points: u32) {
        self.score = (self.score + points).min(self.maximum);
    }
}

/// Label of a score percentage.
pub fn label(percentage: f64) -> &'static str {
    if percentage > 80.0 {
        "Stretched"
    } else if percentage > 70.0 {
        "Commitment"
    } else if percentage > 60.0 {
        "Robust"
    } else {
        "Unimaginable"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreState {
    pub first_period: NaiveDateTime,
    pub overall: Tally,
    pub period_start: NaiveDateTime,
    pub period: Tally,
}

impl ScoreState {
    pub fn fresh(now: NaiveDateTime) -> Self {
        Self {
            first_period: now,
            overall: Tally::default(),
            period_start: now,
            period: Tally::default(),
        }
    }

    /// Parse the statistics block out of a `report.txt`.
    ///
    /// All four fields must be present.
    pub fn parse(text: &str) -> Option<Self> {
        let mut first_period = None;
        let mut overall = None;
        let mut period_start = None;
        let mut period = None;
        let timestamp = |value: &str| NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok();
        let tally = |score: &str, maximum: &str| -> Option<Tally> {
            Some(Tally {
                score: score.parse().ok()?,
                maximum: maximum.parse().ok()?,
            })
        };
        for line in text.lines().map(str::trim) {
            if let Some(captures) = FIRST_PERIOD.captures(line) {
                first_period = timestamp(&captures[1]);
            } else if let Some(captures) = OVERALL.captures(line) {
                overall = tally(&captures[1], &captures[2]);
            } else if let Some(captures) = THIS_PERIOD.captures(line) {
                period_start = timestamp(&captures[1]);
            } else if let Some(captures) = PERIOD.captures(line) {
                period = tally(&captures[1], &captures[2]);
            }
        }
        Some(Self {
            first_period: first_period?,
            overall: overall?,
            period_start: period_start?,
            period: period?,
        })
    }

    /// State of the newest published build that carries statistics, or a
    /// fresh state anchored at `now`.
    pub fn load_latest(report_root: &Path, now: NaiveDateTime) -> Self {
        for build in list_build_dirs(report_root) {
            let path = report_root.join(&build).join("report.txt");
            let Ok(text) = fs::read_to_string(&path) else {
                continue;
            };
            if let Some(state) = Self::parse(&text) {
                debug!("Score state loaded from {}", path.display());
                return state;
            }
        }
        info!("No previous score found, starting a new one");
        Self::fresh(now)
    }
}

/// Whether `day` is a working day given `MM-DD` holidays.
pub fn is_working_day(day: NaiveDate, holidays: &[String]) -> bool {
    if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let today = day.format("%m-%d").to_string();
    !holidays.iter().any(|holiday| *holiday == today)
}

/// Updates a [`ScoreState`] with the outcome of one cycle.
#[derive(Debug, Clone)]
pub struct ScoreTracker {
    state: ScoreState,
    /// Configuration name of every measured slave run.
    measured: Vec<String>,
}

impl ScoreTracker {
    /// `measured` holds one configuration name per slave run of a measured
    /// configuration. Nothing is measured on days off.
    pub fn new(state: ScoreState, measured: Vec<String>, day: NaiveDate, holidays: &[String]) -> Self {
        let measured = if is_working_day(day, holidays) {
            measured
        } else {
            info!("{day} is a day off, the score is not updated");
            Vec::new()
        };
        Self { state, measured }
    }

    pub fn state(&self) -> &ScoreState {
        &self.state
    }

    pub fn is_measured(&self, config_name: &str) -> bool {
        self.measured.iter().any(|c| c == config_name)
    }

    /// Start a new period when it is `length_days` old or when forced.
    /// Only the period counters are reset.
    pub fn maybe_roll_period(&mut self, now: NaiveDateTime, length_days: i64, force: bool) -> bool {
        let elapsed = (now - self.state.period_start).num_days();
        if !force && elapsed < length_days {
            return false;
        }
        info!("Starting a new scoring period after {elapsed} days");
        self.state.period_start = now;
        self.state.period = Tally::default();
        true
    }

    /// Raise both maxima by what the measured runs can earn this cycle.
    pub fn begin_cycle(&mut self) {
        let points = POINTS_PER_CYCLE * self.measured.len() as u32;
        self.state.overall.maximum += points;
        self.state.period.maximum += points;
    }

    /// Credit a measured run whose Build, Regression and Function columns
    /// all succeeded.
    pub fn apply(&mut self, config_name: &str, cells: &[CellStatus; 6]) {
        if !self.is_measured(config_name) {
            return;
        }
        let mandatory = [PassKind::Build, PassKind::Regression, PassKind::Function];
        for kind in mandatory {
            if cells[kind.column()] == CellStatus::Disabled {
                warn!("{config_name} - {kind} is disabled for a measured configuration");
            }
        }
        if mandatory
            .iter()
            .all(|kind| cells[kind.column()] == CellStatus::Success)
        {
            self.state.overall.credit(POINTS_PER_CYCLE);
            self.state.period.credit(POINTS_PER_CYCLE);
        }
    }

    /// Credit a measured run whose slave never reported.
    pub fn lost(&mut self, config_name: &str) {
        if !self.is_measured(config_name) {
            return;
        }
        self.state.overall.credit(LOST_POINTS);
        self.state.period.credit(LOST_POINTS);
    }

    /// Statistics block for the email; empty when nothing is measured.
    pub fn summary(&self) -> String {
        if self.measured.is_empty() {
            return String::new();
        }
        let mut configs = self.measured.clone();
        configs.sort();
        configs.dedup();
        let state = &self.state;
        let mut out = String::new();
        let _ = writeln!(out, "Statistics:\n-----------\n");
        let _ = writeln!(out, "Measured configurations: {}", configs.join(", "));
        let _ = writeln!(
            out,
            "First period: {}",
            state.first_period.format(TIMESTAMP_FORMAT)
        );
        let _ = writeln!(
            out,
            "Overall score: {}/{} ({:.2}%) {}",
            state.overall.score,
            state.overall.maximum,
            state.overall.percentage(),
            label(state.overall.percentage())
        );
        let _ = writeln!(
            out,
            "This period: {}",
            state.period_start.format(TIMESTAMP_FORMAT)
        );
        let _ = writeln!(
            out,
            "Period score: {}/{} ({:.2}%) {}",
            state.period.score,
            state.period.maximum,
            state.period.percentage(),
            label(state.period.percentage())
        );
        out
    }
}
