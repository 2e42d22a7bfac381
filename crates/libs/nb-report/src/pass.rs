//! The outcome of every pass a slave run can execute.
//!
//! A [`PassResult`] is one variant per pass kind. Each carries the time
//! span it covered and a kind-specific payload from which the overall
//! verdict is derived; nothing about a pass is stored as loose text.

use std::{collections::BTreeMap, fmt};

use chrono::{Local, NaiveDateTime};
use nb_config::ProductAction;
use nb_io::CommandOutput;

use crate::verdict::VerdictScan;

/// Timestamp format used in every report.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The six report columns, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassKind {
    Build,
    Regression,
    Performance,
    Function,
    Product,
    PluginBuild,
}

impl PassKind {
    pub const ALL: [PassKind; 6] = [
        PassKind::Build,
        PassKind::Regression,
        PassKind::Performance,
        PassKind::Function,
        PassKind::Product,
        PassKind::PluginBuild,
    ];

    /// Column index in the CSV summary and the result matrix.
    pub fn column(&self) -> usize {
        *self as usize
    }

    /// Column header of the result matrix.
    pub fn title(&self) -> &'static str {
        match self {
            PassKind::Build => "Build",
            PassKind::Regression => "Reg. tests",
            PassKind::Performance => "Perf. tests",
            PassKind::Function => "Func. tests",
            PassKind::Product => "Product tests",
            PassKind::PluginBuild => "Plugin build",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Runtime variant a test pass was executed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Runtime {
    /// The default, load-test oriented runtime.
    Primary,
    /// The function-test runtime.
    Alternate,
}

impl Runtime {
    /// Runtimes to test with, depending on whether the alternate one is enabled.
    pub fn selected(alternate: bool) -> Vec<Runtime> {
        if alternate {
            vec![Runtime::Primary, Runtime::Alternate]
        } else {
            vec![Runtime::Primary]
        }
    }

    /// Suffix used in artifact file names.
    pub fn suffix(&self) -> &'static str {
        match self {
            Runtime::Primary => "rt1",
            Runtime::Alternate => "rt2",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Runtime::Primary => "load-test runtime",
            Runtime::Alternate => "function-test runtime",
        }
    }

    pub fn is_alternate(&self) -> bool {
        matches!(self, Runtime::Alternate)
    }
}

/// Begin and end of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn new(begin: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { begin, end }
    }

    /// From `begin` until now.
    pub fn since(begin: NaiveDateTime) -> Self {
        Self::new(begin, now())
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <-> {}",
            self.begin.format(TIMESTAMP_FORMAT),
            self.end.format(TIMESTAMP_FORMAT)
        )
    }
}

/// Local wall clock time.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Steps of the Build pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSteps {
    /// The unpacked package did not contain the expected source tree.
    SourceMissing(String),
    Ran {
        dependencies: CommandOutput,
        compile: CommandOutput,
        install: CommandOutput,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub span: Span,
    pub steps: BuildSteps,
}

impl BuildOutcome {
    pub fn succeeded(&self) -> bool {
        match &self.steps {
            BuildSteps::SourceMissing(_) => false,
            BuildSteps::Ran {
                dependencies,
                compile,
                install,
            } => dependencies.success() && compile.success() && install.success(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegressionRun {
    pub runtime: Runtime,
    pub span: Span,
    pub build: CommandOutput,
    pub run: CommandOutput,
    pub verdicts: VerdictScan,
}

impl RegressionRun {
    pub fn succeeded(&self) -> bool {
        self.build.success() && self.run.success() && self.verdicts.passed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegressionOutcome {
    pub span: Span,
    pub runs: Vec<RegressionRun>,
}

/// A package some test pass needs, as found on the slave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Missing(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// One load generator execution at a fixed call rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughputPoint {
    pub cps: u32,
    pub output: CommandOutput,
    pub verdicts: VerdictScan,
}

impl ThroughputPoint {
    pub fn succeeded(&self) -> bool {
        self.output.success() && self.verdicts.passed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceRun {
    pub runtime: Runtime,
    pub span: Span,
    pub makefile: CommandOutput,
    pub dependencies: CommandOutput,
    pub build: CommandOutput,
    /// Empty when the build failed.
    pub points: Vec<ThroughputPoint>,
}

impl PerformanceRun {
    /// Whether the load generator can run: only the `make` step decides.
    ///
    /// A failed makefile generation leaves a synthetic failed build.
    pub fn built(&self) -> bool {
        self.build.success()
    }

    pub fn succeeded(&self) -> bool {
        self.built() && self.points.iter().all(ThroughputPoint::succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceOutcome {
    pub span: Span,
    pub package: Availability,
    pub runs: Vec<PerformanceRun>,
}

/// How a function test suite decides pass or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteCriterion {
    /// The suite log reports totals that must match the passed count.
    Counts,
    /// The suite leaves an error log that must be empty or absent.
    ErrorLog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteVerdict {
    pub name: String,
    pub criterion: SuiteCriterion,
    pub status: i32,
    pub passed: bool,
    /// Lines backing the verdict, shown in the reports.
    pub excerpt: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRun {
    pub runtime: Runtime,
    pub span: Span,
    pub suites: Vec<SuiteVerdict>,
}

impl FunctionRun {
    pub fn succeeded(&self) -> bool {
        self.suites.iter().all(|suite| suite.passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionOutcome {
    pub span: Span,
    pub runs: Vec<FunctionRun>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    /// Not enabled for the product.
    Skipped,
    Ran(CommandOutput),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductEntry {
    /// The product's directory was not part of the package.
    Unavailable,
    Actions(BTreeMap<ProductAction, ActionResult>),
}

impl ProductEntry {
    pub fn succeeded(&self) -> bool {
        match self {
            ProductEntry::Unavailable => false,
            ProductEntry::Actions(actions) => actions.values().all(|action| match action {
                ActionResult::Skipped => true,
                ActionResult::Ran(output) => output.success(),
            }),
        }
    }
}

/// Product kind, then product name.
pub type ProductResults = BTreeMap<String, BTreeMap<String, ProductEntry>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRun {
    pub runtime: Runtime,
    pub span: Span,
    pub products: ProductResults,
}

impl ProductRun {
    pub fn succeeded(&self) -> bool {
        self.products
            .values()
            .flat_map(BTreeMap::values)
            .all(ProductEntry::succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductOutcome {
    pub span: Span,
    pub package: Availability,
    pub runs: Vec<ProductRun>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginBuildOutcome {
    pub span: Span,
    pub output: CommandOutput,
    /// End of the build tool's own log file.
    pub log_tail: Vec<String>,
}

/// Outcome of one pass of a slave run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassResult {
    Build(BuildOutcome),
    Regression(RegressionOutcome),
    Performance(PerformanceOutcome),
    Function(FunctionOutcome),
    Product(ProductOutcome),
    PluginBuild(PluginBuildOutcome),
}

impl PassResult {
    pub fn kind(&self) -> PassKind {
        match self {
            PassResult::Build(_) => PassKind::Build,
            PassResult::Regression(_) => PassKind::Regression,
            PassResult::Performance(_) => PassKind::Performance,
            PassResult::Function(_) => PassKind::Function,
            PassResult::Product(_) => PassKind::Product,
            PassResult::PluginBuild(_) => PassKind::PluginBuild,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            PassResult::Build(outcome) => outcome.span,
            PassResult::Regression(outcome) => outcome.span,
            PassResult::Performance(outcome) => outcome.span,
            PassResult::Function(outcome) => outcome.span,
            PassResult::Product(outcome) => outcome.span,
            PassResult::PluginBuild(outcome) => outcome.span,
        }
    }

    pub fn succeeded(&self) -> bool {
        match self {
            PassResult::Build(outcome) => outcome.succeeded(),
            PassResult::Regression(outcome) => outcome.runs.iter().all(RegressionRun::succeeded),
            PassResult::Performance(outcome) => {
                outcome.package.is_available()
                    && outcome.runs.iter().all(PerformanceRun::succeeded)
            }
            PassResult::Function(outcome) => outcome.runs.iter().all(FunctionRun::succeeded),
            PassResult::Product(outcome) => {
                outcome.package.is_available() && outcome.runs.iter().all(ProductRun::succeeded)
            }
            PassResult::PluginBuild(outcome) => outcome.output.success(),
        }
    }

    /// Overall exit status: 0 on success, 1 otherwise.
    pub fn status(&self) -> i32 {
        if self.succeeded() { 0 } else { 1 }
    }
}


#[cfg(test)]
mod tests {
    use super::{fixtures::*, *};

    #[test]
    fn test_build_success_requires_every_step() {
        assert!(build(ok("make")).succeeded());
        assert!(!build(failed("make")).succeeded());
        let missing = PassResult::Build(BuildOutcome {
            span: span(),
            steps: BuildSteps::SourceMissing(String::from("/b/TTCNv3")),
        });
        assert!(!missing.succeeded());
        assert_eq!(missing.status(), 1);
    }

    #[test]
    fn test_performance_missing_package_fails() {
        let result = PassResult::Performance(PerformanceOutcome {
            span: span(),
            package: Availability::Missing(String::from("perftest")),
            runs: Vec::new(),
        });
        assert!(!result.succeeded());
        assert_eq!(result.kind(), PassKind::Performance);
    }

    #[test]
    fn test_performance_run_is_decided_by_make_and_points() {
        let mut run = PerformanceRun {
            runtime: Runtime::Primary,
            span: span(),
            makefile: ok("ttcn3_makefilegen"),
            dependencies: failed("make dep"),
            build: ok("make"),
            points: Vec::new(),
        };
        assert!(run.built());
        assert!(run.succeeded());

        run.points.push(ThroughputPoint {
            cps: 1000,
            output: ok("ttcn3_start"),
            verdicts: VerdictScan::default(),
        });
        assert!(run.succeeded());

        run.build = failed("make");
        assert!(!run.built());
        assert!(!run.succeeded());
    }

    #[test]
    fn test_product_entries() {
        let mut actions = BTreeMap::new();
        actions.insert(ProductAction::Semantic, ActionResult::Ran(ok("ok")));
        actions.insert(ProductAction::Run, ActionResult::Skipped);
        assert!(ProductEntry::Actions(actions.clone()).succeeded());
        actions.insert(ProductAction::Compile, ActionResult::Ran(failed("cc")));
        assert!(!ProductEntry::Actions(actions).succeeded());
        assert!(!ProductEntry::Unavailable.succeeded());
    }

    #[test]
    fn test_columns_follow_report_order() {
        let columns: Vec<usize> = PassKind::ALL.iter().map(PassKind::column).collect();
        assert_eq!(columns, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(Runtime::selected(true).len(), 2);
        assert_eq!(Runtime::Alternate.suffix(), "rt2");
    }
}
