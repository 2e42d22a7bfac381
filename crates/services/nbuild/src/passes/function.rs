//! Function test suites of the source tree.

use std::{fs, io, os::unix::fs::symlink, path::Path, time::Duration};

use nb_report::{
    pass::{FunctionOutcome, FunctionRun, PassResult, Runtime, Span, SuiteCriterion, SuiteVerdict, now},
    verdict::{evaluate_count_log, evaluate_error_log},
};
use tracing::{error, info, warn};

use super::{PassContext, write_log};

const SUITE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Suite directories below `function_test`, in execution order.
pub const SUITES: [&str; 10] = [
    "BER_EncDec",
    "Config_Parser",
    "RAW_EncDec",
    "Semantic_Analyser",
    "Semantic_Analyser/float",
    "Semantic_Analyser/import_of_iports",
    "Semantic_Analyser/options",
    "Semantic_Analyser/ver",
    "Semantic_Analyser/xer",
    "Text_EncDec",
];

/// Last path component of a suite, used in log names.
pub fn suite_name(suite: &str) -> &str {
    suite.rsplit('/').next().unwrap_or(suite)
}

pub fn criterion(name: &str) -> SuiteCriterion {
    match name {
        "Config_Parser" | "Semantic_Analyser" => SuiteCriterion::Counts,
        _ => SuiteCriterion::ErrorLog,
    }
}

pub fn run(ctx: &PassContext) -> PassResult {
    let begin = now();
    let runs = Runtime::selected(ctx.config.alternate_runtime)
        .into_iter()
        .map(|runtime| {
            let begin = now();
            info!("{} - Function tests with the {}", ctx.label(), runtime.label());
            let suites = SUITES
                .iter()
                .map(|suite| run_suite(ctx, suite, runtime))
                .collect();
            FunctionRun {
                runtime,
                span: Span::since(begin),
                suites,
            }
        })
        .collect();
    PassResult::Function(FunctionOutcome {
        span: Span::since(begin),
        runs,
    })
}

fn run_suite(ctx: &PassContext, suite: &str, runtime: Runtime) -> SuiteVerdict {
    let label = ctx.label();
    let name = suite_name(suite);
    let criterion = criterion(name);
    let dir = ctx.source_dir().join("function_test").join(suite);
    if !dir.is_dir() {
        error!("{label} - Function test suite {suite} is missing");
        return SuiteVerdict {
            name: name.to_string(),
            criterion,
            status: nb_io::SPAWN_FAILURE_STATUS,
            passed: false,
            excerpt: vec![format!("{} does not exist", dir.display())],
        };
    }

    if let Some(perl) = &ctx.config.perl {
        if let Err(err) = link_perl(perl, &dir) {
            warn!("{label} - Failed to link perl into {suite} - {err}");
        }
    }

    let script = if dir.join("run_test_all").is_file() {
        "./run_test_all"
    } else {
        "./run_test"
    };
    let mut args = Vec::new();
    if runtime.is_alternate() && criterion == SuiteCriterion::Counts {
        args.push("-rt2");
    }
    let mut runner = ctx
        .command(script, args)
        .current_dir(&dir)
        .timeout(SUITE_TIMEOUT);
    if runtime.is_alternate() {
        runner = runner.env("RT2", "1");
    }
    let output = runner.output();
    let log_dir = ctx.log_dir();
    write_log(
        &log_dir.join(format!("functest-{name}.{}", runtime.suffix())),
        &output,
    );

    let (passed, excerpt) = match criterion {
        SuiteCriterion::Counts => {
            let lines: Vec<&str> = output.lines().collect();
            evaluate_count_log(&lines)
        }
        SuiteCriterion::ErrorLog => {
            let content = error_log(&dir, name);
            if let Some(content) = &content {
                let kept = log_dir.join(format!("functest-{name}-error.{}", runtime.suffix()));
                if let Err(err) = fs::write(&kept, content) {
                    warn!("{label} - Failed to keep {} - {err}", kept.display());
                }
            }
            evaluate_error_log(content.as_deref())
        }
    };
    if !passed {
        error!("{label} - Function test suite {suite} failed on the {}", runtime.label());
    }
    SuiteVerdict {
        name: name.to_string(),
        criterion,
        status: output.status,
        passed,
        excerpt,
    }
}

/// The error log a suite left behind, the fast script's taking precedence.
fn error_log(dir: &Path, name: &str) -> Option<String> {
    ["fast_script_error", "script_error"]
        .iter()
        .find_map(|kind| fs::read_to_string(dir.join(format!("{name}_TD.{kind}"))).ok())
}

fn link_perl(perl: &Path, dir: &Path) -> io::Result<()> {
    let link = dir.join("perl");
    if fs::symlink_metadata(&link).is_ok() {
        return Ok(());
    }
    symlink(perl, link)
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;
    use crate::testing::catalog;

    fn script(path: &Path, body: &str) {
        fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("Couldn't write script");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("Couldn't chmod");
    }

    #[test]
    fn test_suite_names_and_criteria() {
        assert_eq!(suite_name("Semantic_Analyser/float"), "float");
        assert_eq!(suite_name("BER_EncDec"), "BER_EncDec");
        assert_eq!(criterion("Config_Parser"), SuiteCriterion::Counts);
        assert_eq!(criterion("float"), SuiteCriterion::ErrorLog);
        assert_eq!(criterion("RAW_EncDec"), SuiteCriterion::ErrorLog);
    }

    #[test]
    fn test_suites_are_decided_by_their_criterion() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = catalog(dir.path());
        let config = &catalog.configs["linux_gcc"];
        let ctx = PassContext::new(&catalog, config, "lab1");
        let suites = ctx.source_dir().join("function_test");
        for suite in SUITES {
            fs::create_dir_all(suites.join(suite)).expect("Couldn't create suite");
            script(&suites.join(suite).join("run_test"), "exit 0");
        }
        script(
            &suites.join("Config_Parser/run_test"),
            "echo 'Total number of tests: 4'\necho 'PASSED test cases: 4'",
        );
        script(
            &suites.join("Semantic_Analyser/run_test"),
            "echo 'Total number of tests: 4'\necho 'PASSED test cases: 3'",
        );
        fs::write(suites.join("RAW_EncDec/RAW_EncDec_TD.script_error"), "TC_1 failed\n")
            .expect("Couldn't write error log");
        fs::write(suites.join("Text_EncDec/Text_EncDec_TD.fast_script_error"), "")
            .expect("Couldn't write error log");
        fs::create_dir_all(ctx.log_dir()).expect("Couldn't create log dir");

        let PassResult::Function(outcome) = run(&ctx) else {
            panic!("Not a function result");
        };
        let verdicts: Vec<(&str, bool)> = outcome.runs[0]
            .suites
            .iter()
            .map(|suite| (suite.name.as_str(), suite.passed))
            .collect();
        assert!(verdicts.contains(&("Config_Parser", true)));
        assert!(verdicts.contains(&("Semantic_Analyser", false)));
        assert!(verdicts.contains(&("RAW_EncDec", false)));
        assert!(verdicts.contains(&("Text_EncDec", true)));
        assert!(verdicts.contains(&("float", true)));
        assert!(ctx.log_dir().join("functest-Config_Parser.rt1").is_file());
        assert!(ctx.log_dir().join("functest-RAW_EncDec-error.rt1").is_file());
    }
}
