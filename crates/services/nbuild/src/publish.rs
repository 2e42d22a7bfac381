//! Gather the collected results of a cycle and present them: the email, the
//! site, the plots.

use std::{fs, path::Path};

use chrono::NaiveDateTime;
use nb_config::Catalog;
use nb_report::{
    ReportMatrix, ScoreState, ScoreTracker, SlaveRun, Span, plot, publish_csv2email,
    site::{self, CleanupDestination, Retention},
};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::{distribute::transport_for, mail::Mailer, prelude::*};

/// Name of the email file in every published build.
pub const EMAIL_FILE: &str = "report.txt";

/// Copy the master's log tree into the published build.
fn copy_logs(log_root: &Path, build_root: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(log_root).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let Ok(relative) = entry.path().strip_prefix(log_root) else {
            continue;
        };
        let target = build_root.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Link to the published build, when the site has a public address.
fn site_link(site_url: &str, build: &str) -> Option<String> {
    (!site_url.is_empty()).then(|| format!("{}/{build}", site_url.trim_end_matches('/')))
}

/// Present a finished cycle.
///
/// The email is rendered and written before anything else is attempted.
/// Later failures (site, plots, mail) are logged and do not undo it.
pub fn gather_and_present(
    catalog: &Catalog,
    span: Span,
    runs: &[SlaveRun],
    reset: bool,
    mailer: &dyn Mailer,
) -> Result<ReportMatrix> {
    let common = &catalog.common;
    let html_dir = &common.html_dir;
    let now: NaiveDateTime = span.end;
    let build = site::build_dir_name(span.begin);
    let build_root = html_dir.join(&build);

    let state = ScoreState::load_latest(html_dir, now);
    fs::create_dir_all(&build_root)?;
    match copy_logs(&common.log_dir, &build_root) {
        Ok(copied) => info!("{copied} log files published into {}", build_root.display()),
        Err(err) => error!("Failed to publish the logs - {err}"),
    }

    let measured = runs
        .iter()
        .filter(|run| catalog.config(&run.config_name).is_some_and(|config| config.measure))
        .map(|run| run.config_name.clone())
        .collect();
    let mut tracker = ScoreTracker::new(state, measured, now.date(), &common.holidays);
    tracker.maybe_roll_period(now, common.measure_period_days, reset);

    let link = site_link(&common.site_url, &build);
    let (matrix, body) = publish_csv2email(
        &build_root.join(EMAIL_FILE),
        &common.log_dir,
        runs,
        span,
        &mut tracker,
        link.as_deref(),
    )?;

    if let Err(err) = site::update_latest_link(html_dir, &build) {
        warn!("Failed to update the latest link - {err}");
    }
    let cleanup_transport = common.cleanup.as_ref().and_then(|target| {
        match catalog.slaves.get(&target.slave) {
            Some(slave) => Some((transport_for(slave, &nb_io::transport::local_host_names()), target)),
            None => {
                error!("Cleanup slave {} is not in the catalog", target.slave);
                None
            }
        }
    });
    let cleanup = cleanup_transport
        .as_ref()
        .map(|(transport, target)| CleanupDestination {
            transport: transport.as_ref(),
            dir: &target.dir,
        });
    let retention = Retention {
        archive_days: common.archive_days,
        cleanup_days: common.cleanup_days,
    };
    if let Err(err) = site::publish_html(html_dir, &build, now, retention, cleanup.as_ref()) {
        error!("Failed to publish the site - {err}");
    }

    if let Err(err) = plot::plot(html_dir, &build, &plot::collect_data(html_dir), &common.plot_command) {
        error!("Failed to plot the performance history - {err}");
    }

    if let Err(err) = mailer.send(&catalog.recipients, &common.mail_subject, &body) {
        error!("Failed to send the report - {err}");
    }
    Ok(matrix)
}
