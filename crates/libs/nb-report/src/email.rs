//! The cycle email: build time, score statistics and the result matrix.
//!
//! The same text is kept as the build's `report.txt` on the site, which is
//! where the next cycle reads its score state from.

use std::{fmt::Write as _, fs, path::Path};

use tracing::{info, warn};

use crate::{
    matrix::{ReportMatrix, SlaveRun, aggregate},
    pass::{Span, TIMESTAMP_FORMAT},
    prelude::*,
    score::ScoreTracker,
};

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}\n{}\n", "-".repeat(title.len()));
}

/// Render the email body.
///
/// `statistics` is the [`ScoreTracker::summary`] block and is left out when
/// empty.
pub fn render_email(
    span: Span,
    statistics: &str,
    matrix: &ReportMatrix,
    site_link: Option<&str>,
) -> String {
    let mut out = String::new();
    section(&mut out, "Full build time:");
    let _ = writeln!(
        out,
        "{} <-> {}\n",
        span.begin.format(TIMESTAMP_FORMAT),
        span.end.format(TIMESTAMP_FORMAT)
    );
    if !statistics.is_empty() {
        let _ = writeln!(out, "{statistics}");
    }
    section(&mut out, "The result matrix:");
    out.push_str(&matrix.to_table());
    out.push('\n');
    if let Some(link) = site_link {
        let _ = writeln!(out, "Detailed logs: {link}");
    }
    out
}

/// Aggregate the summaries of `runs`, score them and write the email to
/// `email_file`.
///
/// The tracker's cycle is opened here; rolling the period is left to the
/// caller so it happens before the maxima grow.
pub fn publish_csv2email(
    email_file: &Path,
    log_root: &Path,
    runs: &[SlaveRun],
    span: Span,
    tracker: &mut ScoreTracker,
    site_link: Option<&str>,
) -> Result<(ReportMatrix, String)> {
    let matrix = aggregate(log_root, runs);
    tracker.begin_cycle();
    for row in &matrix.rows {
        if row.is_lost() {
            warn!("{} - No result, counted as lost", row.run.label());
            tracker.lost(&row.run.config_name);
        } else {
            tracker.apply(&row.run.config_name, &row.cells);
        }
    }

    let body = render_email(span, &tracker.summary(), &matrix, site_link);
    if let Some(dir) = email_file.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(email_file, &body).map_err(|source| Error::Write {
        path: email_file.to_path_buf(),
        source,
    })?;
    info!(
        "Result matrix of {} runs written to {}",
        matrix.rows.len(),
        email_file.display()
    );
    Ok((matrix, body))
}
