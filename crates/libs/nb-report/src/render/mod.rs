//! Report renderers.
//!
//! All renderers are pure functions of a [`ResultStore`] and the
//! [`SlaveSummary`] derived from it: rendering twice gives the same bytes.

mod document;
mod html;
pub mod table;
mod text;

use std::fmt::Write;

use strip_ansi_escapes::strip;

use crate::{store::ResultStore, summary::SlaveSummary};

pub use document::TAIL_LINES;
pub(crate) use html::escape;

/// Remove terminal escape sequences from tool output.
pub(crate) fn clean_line(input: &str) -> String {
    String::from_utf8_lossy(&strip(input.as_bytes())).to_string()
}

/// Host strings may not introduce extra CSV fields.
fn csv_field(value: &str) -> String {
    value.replace([',', '\n', '\r'], ";")
}

/// The one-line machine readable summary:
/// `begin,end,platform,toolchain,config,slave` followed by one
/// `-1`/`0`/`1` code per pass column.
pub fn render_csv(summary: &SlaveSummary) -> String {
    let context = &summary.context;
    let mut line = format!(
        "{},{},{},{},{},{}",
        context.begin.format(crate::pass::TIMESTAMP_FORMAT),
        context.end.format(crate::pass::TIMESTAMP_FORMAT),
        csv_field(&context.host.platform),
        csv_field(&context.host.toolchain),
        csv_field(&context.config_name),
        csv_field(&context.slave_name),
    );
    for cell in summary.cells {
        let _ = write!(line, ",{}", cell.code().unwrap_or(1));
    }
    line.push('\n');
    line
}

/// Plain text report.
pub fn render_text(store: &ResultStore, summary: &SlaveSummary) -> String {
    let mut doc = text::TextDocument::default();
    document::write_report(&mut doc, store, summary);
    doc.finish()
}

/// HTML report.
pub fn render_html(store: &ResultStore, summary: &SlaveSummary) -> String {
    let mut doc = html::HtmlDocument::new(&format!(
        "{} on {}",
        summary.context.config_name, summary.context.slave_name
    ));
    document::write_report(&mut doc, store, summary);
    doc.finish()
}
