//! Regression tests, once per selected runtime.

use std::time::Duration;

use nb_report::{
    pass::{PassResult, RegressionOutcome, RegressionRun, Runtime, Span, now},
    verdict::scan_verdicts,
};
use tracing::{error, info};

use super::PassContext;

const BUILD_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const STEP_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub fn run(ctx: &PassContext) -> PassResult {
    let begin = now();
    let runs = Runtime::selected(ctx.config.alternate_runtime)
        .into_iter()
        .map(|runtime| run_runtime(ctx, runtime))
        .collect();
    PassResult::Regression(RegressionOutcome {
        span: Span::since(begin),
        runs,
    })
}

fn run_runtime(ctx: &PassContext, runtime: Runtime) -> RegressionRun {
    let begin = now();
    let label = ctx.label();
    let dir = ctx.source_dir().join("regression_test");
    info!("{label} - Regression tests with the {}", runtime.label());

    ctx.make(&dir, &["distclean"], runtime, STEP_TIMEOUT);
    let build = ctx.make(&dir, &[], runtime, BUILD_TIMEOUT);
    if !build.success() {
        error!("{label} - Building the regression tests failed - status {}", build.status);
    }
    let run = ctx.make(&dir, &["run"], runtime, STEP_TIMEOUT);
    let verdicts = scan_verdicts(&run.stdout, &ctx.common().expected_failure_markers);
    if !run.success() || !verdicts.passed() {
        error!(
            "{label} - Regression tests failed on the {} - status {}",
            runtime.label(),
            run.status
        );
    }
    ctx.make(&dir, &["clean"], runtime, STEP_TIMEOUT);

    RegressionRun {
        runtime,
        span: Span::since(begin),
        build,
        run,
        verdicts,
    }
}
