//! Settings shared by every configuration of a nightly cycle.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Shell command templates used to retrieve the sources.
///
/// `{version}` is replaced by the configuration's version string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutCommands {
    /// Retrieve the head of the main line.
    pub head: String,
    /// Retrieve a release tag.
    pub tag: String,
    /// Retrieve the state of a given day.
    pub date: String,
}

impl Default for CheckoutCommands {
    fn default() -> Self {
        Self {
            head: String::from("cvs get TTCNv3"),
            tag: String::from("cvs co -r{version} TTCNv3"),
            date: String::from("cvs co -D{version} TTCNv3"),
        }
    }
}

/// Machine and directory that receive archived builds once they are old
/// enough to leave the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupTarget {
    /// Name of a slave from the catalog.
    pub slave: String,
    /// Destination directory on that slave.
    pub dir: String,
}

/// Global settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonConfig {
    /// Scratch space of the master.
    pub build_dir: PathBuf,
    /// Where the master collects the logs of the slaves.
    pub log_dir: PathBuf,
    /// Root of the published site.
    pub html_dir: PathBuf,
    /// Checkout holding the product (test port, protocol module) sources.
    #[serde(default)]
    pub product_source_dir: PathBuf,
    /// Link printed in the footer of the email.
    #[serde(default)]
    pub site_url: String,
    /// Name of the top directory of the source package.
    #[serde(default = "default_source_dir_name")]
    pub source_dir_name: String,
    #[serde(default)]
    pub checkout: CheckoutCommands,
    /// Build directories older than this are compressed.
    #[serde(default = "default_archive_days")]
    pub archive_days: i64,
    /// Compressed builds older than this are moved to `cleanup`.
    #[serde(default = "default_cleanup_days")]
    pub cleanup_days: i64,
    #[serde(default)]
    pub cleanup: Option<CleanupTarget>,
    /// Length of a scoring period.
    #[serde(default = "default_measure_period_days")]
    pub measure_period_days: i64,
    /// Days without scoring, as `MM-DD`.
    #[serde(default = "default_holidays")]
    pub holidays: Vec<String>,
    /// Lines that, when directly preceding a failing verdict, mark it as expected.
    #[serde(default = "default_expected_failure_markers")]
    pub expected_failure_markers: Vec<String>,
    /// GNU make, `gmake` on platforms where `make` is another flavour.
    #[serde(default = "default_make_command")]
    pub make_command: String,
    #[serde(default = "default_make_jobs")]
    pub make_jobs: u32,
    /// Command reading a complete message (headers included) on stdin.
    #[serde(default = "default_mail_command")]
    pub mail_command: String,
    #[serde(default = "default_mail_subject")]
    pub mail_subject: String,
    #[serde(default = "default_plot_command")]
    pub plot_command: String,
}

fn default_source_dir_name() -> String {
    String::from("TTCNv3")
}

fn default_archive_days() -> i64 {
    4
}

fn default_cleanup_days() -> i64 {
    8
}

fn default_measure_period_days() -> i64 {
    30
}

fn default_holidays() -> Vec<String> {
    ["01-01", "03-15", "05-01", "08-20", "10-23", "11-01", "12-25", "12-26"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_expected_failure_markers() -> Vec<String> {
    vec![String::from("TverdictOper")]
}

fn default_make_command() -> String {
    String::from("make")
}

fn default_make_jobs() -> u32 {
    4
}

fn default_mail_command() -> String {
    String::from("/usr/sbin/sendmail -t")
}

fn default_mail_subject() -> String {
    String::from("Nightly build results")
}

fn default_plot_command() -> String {
    String::from("gnuplot")
}
