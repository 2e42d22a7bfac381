//! Pass results and everything published from them.
//!
//! On a slave, a [`ResultPublisher`] records one [`PassResult`] per pass and
//! renders `report.csv`, `report.txt` and `report.html`. On the master, the
//! collected summaries are aggregated into a [`ReportMatrix`], scored by a
//! [`ScoreTracker`], mailed and published on the site.

pub mod email;
pub mod error;
pub mod matrix;
pub mod pass;
pub mod plot;
pub mod prelude;
pub mod render;
pub mod score;
pub mod site;
pub mod store;
pub mod summary;
pub mod verdict;

pub use email::{publish_csv2email, render_email};
pub use matrix::{ReportMatrix, SlaveRun, aggregate};
pub use pass::{PassKind, PassResult, Runtime, Span};
pub use score::{ScoreState, ScoreTracker};
pub use store::{ResultPublisher, ResultStore};
pub use summary::{CellStatus, HostInfo, ReportContext, SlaveSummary};
