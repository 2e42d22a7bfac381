//! Load tests of the performance test package at increasing call rates.

use std::{fs, path::Path, time::Duration};

use nb_io::CommandOutput;
use nb_report::{
    pass::{
        Availability, PassResult, PerformanceOutcome, PerformanceRun, Runtime, Span,
        ThroughputPoint, now,
    },
    verdict::scan_verdicts,
};
use tracing::{error, info, warn};

use super::{PassContext, remove_matching, unpack_matching};

pub const PACKAGE_PATTERN: &str = "perftest-*.tar.bz2";
const PACKAGE_DIR: &str = "perftest";
const DEPENDENCY_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const BUILD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const POINT_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const DEPFILES_INCLUDE: &str = "-include $(DEPFILES)";

/// Call rates to measure: six points `step` apart starting at `min`, or the
/// single point when both are equal.
///
/// `step` is a fifth of the range rounded down, so `max` is only reached
/// when the range divides by five.
pub fn cps_points(min: u32, max: u32) -> Vec<u32> {
    if min == max {
        return vec![min];
    }
    let step = min.abs_diff(max) / 5;
    let mut points: Vec<u32> = (0..=5).map(|i| min + i * step).collect();
    points.dedup();
    points
}

pub fn run(ctx: &PassContext) -> PassResult {
    let begin = now();
    let label = ctx.label();
    let build_dir = ctx.build_dir();

    unpack_matching(ctx, build_dir, PACKAGE_PATTERN);
    let dir = build_dir.join(PACKAGE_DIR);
    let (package, runs) = if dir.is_dir() {
        let runs = Runtime::selected(ctx.config.alternate_runtime)
            .into_iter()
            .map(|runtime| run_runtime(ctx, &dir, runtime))
            .collect();
        (Availability::Available, runs)
    } else {
        let reason = format!("{} was not found after unpacking", dir.display());
        error!("{label} - {reason}");
        (Availability::Missing(reason), Vec::new())
    };
    remove_matching(build_dir, "perftest*");

    PassResult::Performance(PerformanceOutcome {
        span: Span::since(begin),
        package,
        runs,
    })
}

fn run_runtime(ctx: &PassContext, dir: &Path, runtime: Runtime) -> PerformanceRun {
    let begin = now();
    let label = ctx.label();
    info!("{label} - Performance tests with the {}", runtime.label());

    let flags = if runtime.is_alternate() { "-fpgR" } else { "-fpg" };
    let makefile = ctx
        .shell(format!(
            "ttcn3_makefilegen -e titansim {flags} *.ttcnpp *.ttcnin *.ttcn *.cc *.cfg"
        ))
        .current_dir(dir)
        .timeout(DEPENDENCY_TIMEOUT)
        .output();
    if makefile.success() {
        if let Err(err) = strip_dependency_include(&dir.join("Makefile")) {
            warn!("{label} - Failed to patch the generated Makefile - {err}");
        }
    }

    let (dependencies, build) = if makefile.success() {
        ctx.make(dir, &["clean"], runtime, DEPENDENCY_TIMEOUT);
        let dependencies = ctx.make(dir, &["dep"], runtime, DEPENDENCY_TIMEOUT);
        let build = ctx.make(dir, &[], runtime, BUILD_TIMEOUT);
        (dependencies, build)
    } else {
        let skipped = || CommandOutput::synthetic(makefile.status, "Makefile generation failed");
        (skipped(), skipped())
    };

    let mut run = PerformanceRun {
        runtime,
        span: Span::since(begin),
        makefile,
        dependencies,
        build,
        points: Vec::new(),
    };
    if !run.built() {
        error!("{label} - Building the performance tests failed");
        return run;
    }

    run.points = cps_points(ctx.config.cps_min, ctx.config.cps_max)
        .into_iter()
        .map(|cps| run_point(ctx, dir, cps))
        .collect();
    run.span = Span::since(begin);
    run
}

fn run_point(ctx: &PassContext, dir: &Path, cps: u32) -> ThroughputPoint {
    let output = ctx
        .shell(format!(
            "cpp -DTSP_CPS_CPP={cps}.0 config.cfg >config.cfg-tmp && ttcn3_start ./titansim ./config.cfg-tmp"
        ))
        .current_dir(dir)
        .timeout(POINT_TIMEOUT)
        .output();
    let verdicts = scan_verdicts(&output.stdout, &[]);
    let point = ThroughputPoint {
        cps,
        output,
        verdicts,
    };
    if !point.succeeded() {
        error!("{} - Load test at {cps} cps failed", ctx.label());
    }
    point
}

/// Drop the generated dependency include, the package ships without them.
fn strip_dependency_include(makefile: &Path) -> std::io::Result<()> {
    let content = fs::read_to_string(makefile)?;
    let kept: Vec<&str> = content
        .lines()
        .filter(|line| line.trim() != DEPFILES_INCLUDE)
        .collect();
    fs::write(makefile, kept.join("\n") + "\n")
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use nb_config::Catalog;

    use super::*;
    use crate::testing::catalog;

    const FAKE_MAKEFILEGEN: &str = "#!/bin/sh
printf 'all: titansim\n-include $(DEPFILES)\n' > Makefile
";
    const FAKE_CPP: &str = "#!/bin/sh
echo \"$1\"
";
    const FAKE_LOAD_GENERATOR: &str = "#!/bin/sh
if grep -q '=1000.0' \"$2\"; then
  echo 'Verdict statistics: 0 none, 1 pass (50.00%), 0 inconc, 1 fail (50.00%), 0 error'
else
  echo 'Verdict statistics: 0 none, 2 pass (100.00%), 0 inconc, 0 fail, 0 error'
fi
";

    fn script(path: &Path, body: &str) {
        fs::write(path, body).expect("Couldn't write script");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("Couldn't chmod");
    }

    /// A catalog whose toolchain is made of shell scripts and whose make
    /// runs `make_body`.
    fn fake_toolchain(root: &Path, make_body: &str) -> Catalog {
        let mut catalog = catalog(root);
        let make = root.join("fake-make");
        script(&make, make_body);
        catalog.common.make_command = make.display().to_string();

        let config = &catalog.configs["linux_gcc"];
        let bin = config.install_dir.join("bin");
        fs::create_dir_all(&bin).expect("Couldn't create bin dir");
        script(&bin.join("ttcn3_makefilegen"), FAKE_MAKEFILEGEN);
        script(&bin.join("cpp"), FAKE_CPP);
        script(&bin.join("ttcn3_start"), FAKE_LOAD_GENERATOR);
        fs::create_dir_all(config.build_dir.join(PACKAGE_DIR)).expect("Couldn't create package dir");
        catalog
    }

    fn performance_run(catalog: &Catalog) -> PerformanceOutcome {
        let ctx = PassContext::new(catalog, &catalog.configs["linux_gcc"], "lab1");
        let PassResult::Performance(outcome) = run(&ctx) else {
            panic!("Not a performance result");
        };
        outcome
    }

    #[test]
    fn test_cps_points() {
        assert_eq!(cps_points(1000, 2000), vec![1000, 1200, 1400, 1600, 1800, 2000]);
        assert_eq!(cps_points(500, 500), vec![500]);
        assert_eq!(cps_points(10, 12), vec![10]);
        assert_eq!(cps_points(100, 107), vec![100, 101, 102, 103, 104, 105]);
    }

    #[test]
    fn test_strip_dependency_include() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let makefile = dir.path().join("Makefile");
        fs::write(&makefile, "all: titansim\n-include $(DEPFILES)\nclean:\n")
            .expect("Couldn't write Makefile");
        strip_dependency_include(&makefile).expect("Couldn't patch");
        assert_eq!(
            fs::read_to_string(&makefile).expect("Couldn't read"),
            "all: titansim\nclean:\n"
        );
    }

    #[test]
    fn test_missing_package() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = catalog(dir.path());
        let config = &catalog.configs["linux_gcc"];
        fs::create_dir_all(&config.build_dir).expect("Couldn't create build dir");
        let ctx = PassContext::new(&catalog, config, "lab1");

        let PassResult::Performance(outcome) = run(&ctx) else {
            panic!("Not a performance result");
        };
        assert!(!outcome.package.is_available());
        assert!(outcome.runs.is_empty());
    }

    #[test]
    fn test_failed_dependencies_do_not_skip_the_load_points() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = fake_toolchain(dir.path(), "#!/bin/sh\n[ \"$1\" = dep ] && exit 2\nexit 0\n");

        let outcome = performance_run(&catalog);
        assert_eq!(outcome.runs.len(), 1);
        let run = &outcome.runs[0];
        assert_eq!(run.dependencies.status, 2);
        assert!(run.build.success());
        assert_eq!(run.points.len(), 6);
    }

    #[test]
    fn test_every_load_point_is_attempted() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = fake_toolchain(dir.path(), "#!/bin/sh\nexit 0\n");

        let outcome = performance_run(&catalog);
        let run = &outcome.runs[0];
        let points: Vec<(u32, bool)> = run
            .points
            .iter()
            .map(|point| (point.cps, point.succeeded()))
            .collect();
        assert_eq!(
            points,
            vec![
                (1000, false),
                (1200, true),
                (1400, true),
                (1600, true),
                (1800, true),
                (2000, true),
            ]
        );
        assert!(!run.succeeded());
        assert!(!PassResult::Performance(outcome.clone()).succeeded());
        assert!(!catalog.configs["linux_gcc"].build_dir.join(PACKAGE_DIR).exists());
    }

    #[test]
    fn test_failed_make_skips_the_load_points() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = fake_toolchain(dir.path(), "#!/bin/sh\n[ -z \"$1\" ] && exit 2\nexit 0\n");

        let outcome = performance_run(&catalog);
        let run = &outcome.runs[0];
        assert!(!run.built());
        assert!(run.points.is_empty());
    }
}
