//! Report content shared by the text and HTML renderers.

use nb_io::CommandOutput;

use crate::{
    pass::{
        ActionResult, Availability, BuildSteps, PassKind, PassResult, ProductEntry, Span,
        SuiteCriterion, TIMESTAMP_FORMAT,
    },
    store::ResultStore,
    summary::SlaveSummary,
};

/// Number of output lines shown for a failed step.
pub const TAIL_LINES: usize = 20;

/// Markup-independent report building blocks.
pub(crate) trait Document {
    fn heading(&mut self, level: u8, text: &str);
    fn paragraph(&mut self, text: &str);
    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]);
    fn preformatted(&mut self, lines: &[String]);
    fn image(&mut self, source: &str, alt: &str);
}

fn result_label(success: bool) -> &'static str {
    if success { "Success" } else { "Failure" }
}

fn step_row(name: &str, output: &CommandOutput) -> Vec<String> {
    vec![
        name.to_string(),
        result_label(output.success()).to_string(),
        output.status.to_string(),
    ]
}

fn failing_tails(doc: &mut impl Document, steps: &[(&str, &CommandOutput)]) {
    for (name, output) in steps.iter().filter(|(_, output)| !output.success()) {
        doc.paragraph(&format!("Last lines of `{name}`:"));
        let tail: Vec<String> = output
            .tail(TAIL_LINES)
            .into_iter()
            .map(str::to_string)
            .collect();
        doc.preformatted(&tail);
    }
}

fn pass_heading(doc: &mut impl Document, kind: PassKind, result: &PassResult) {
    doc.heading(2, &format!("{kind}: {}", result_label(result.succeeded())));
    doc.paragraph(&result.span().to_string());
}

fn run_heading(doc: &mut impl Document, title: String, span: &Span) {
    doc.heading(3, &title);
    doc.paragraph(&span.to_string());
}

/// Write the complete report of a slave run.
pub(crate) fn write_report(doc: &mut impl Document, store: &ResultStore, summary: &SlaveSummary) {
    let context = &summary.context;
    doc.heading(
        1,
        &format!(
            "Nightly build of {} on {}",
            context.config_name, context.slave_name
        ),
    );
    doc.paragraph(&format!("Platform: {}", context.host.platform));
    doc.paragraph(&format!("Toolchain: {}", context.host.toolchain));
    doc.paragraph(&format!(
        "Build time: {} <-> {}",
        context.begin.format(TIMESTAMP_FORMAT),
        context.end.format(TIMESTAMP_FORMAT)
    ));
    let rows: Vec<Vec<String>> = PassKind::ALL
        .iter()
        .map(|kind| vec![kind.title().to_string(), summary.cell(*kind).to_string()])
        .collect();
    doc.table(&["Pass", "Result"], &rows);

    for result in store.iter() {
        pass_heading(doc, result.kind(), result);
        match result {
            PassResult::Build(outcome) => match &outcome.steps {
                BuildSteps::SourceMissing(path) => {
                    doc.paragraph(&format!("Source tree {path} not found in the package"));
                }
                BuildSteps::Ran {
                    dependencies,
                    compile,
                    install,
                } => {
                    let steps = [
                        ("make dep", dependencies),
                        ("make", compile),
                        ("make install", install),
                    ];
                    let rows: Vec<Vec<String>> =
                        steps.iter().map(|(name, output)| step_row(name, output)).collect();
                    doc.table(&["Step", "Result", "Status"], &rows);
                    failing_tails(doc, &steps);
                }
            },
            PassResult::Regression(outcome) => {
                for run in &outcome.runs {
                    run_heading(doc, format!("Regression tests, {}", run.runtime.label()), &run.span);
                    let steps = [("make", &run.build), ("make run", &run.run)];
                    let rows: Vec<Vec<String>> =
                        steps.iter().map(|(name, output)| step_row(name, output)).collect();
                    doc.table(&["Step", "Result", "Status"], &rows);
                    doc.paragraph(&format!(
                        "{} verdict lines, {} expected failures, {} unexpected failures",
                        run.verdicts.verdicts,
                        run.verdicts.expected_failures,
                        run.verdicts.failing_lines.len()
                    ));
                    if !run.verdicts.failing_lines.is_empty() {
                        doc.preformatted(&run.verdicts.failing_lines);
                    }
                    failing_tails(doc, &steps);
                }
            }
            PassResult::Performance(outcome) => {
                if let Availability::Missing(reason) = &outcome.package {
                    doc.paragraph(&format!("Performance test package unavailable: {reason}"));
                }
                for run in &outcome.runs {
                    let rt = run.runtime.suffix();
                    run_heading(doc, format!("Performance tests, {}", run.runtime.label()), &run.span);
                    let steps = [
                        ("makefile generation", &run.makefile),
                        ("make dep", &run.dependencies),
                        ("make", &run.build),
                    ];
                    let mut rows: Vec<Vec<String>> =
                        steps.iter().map(|(name, output)| step_row(name, output)).collect();
                    rows.extend(run.points.iter().map(|point| {
                        vec![
                            format!("{} CPS", point.cps),
                            result_label(point.succeeded()).to_string(),
                            point.output.status.to_string(),
                        ]
                    }));
                    doc.table(&["Step", "Result", "Status"], &rows);
                    failing_tails(doc, &steps);
                    for point in run.points.iter().filter(|point| !point.succeeded()) {
                        doc.paragraph(&format!("Failing verdicts at {} CPS:", point.cps));
                        doc.preformatted(&point.verdicts.failing_lines);
                    }
                    doc.image(
                        &format!("../perftest-stats-{rt}.svg"),
                        &format!("Throughput history, {}", run.runtime.label()),
                    );
                }
            }
            PassResult::Function(outcome) => {
                for run in &outcome.runs {
                    run_heading(doc, format!("Function tests, {}", run.runtime.label()), &run.span);
                    let rows: Vec<Vec<String>> = run
                        .suites
                        .iter()
                        .map(|suite| {
                            vec![
                                suite.name.clone(),
                                result_label(suite.passed).to_string(),
                                match suite.criterion {
                                    SuiteCriterion::Counts => String::from("test counts"),
                                    SuiteCriterion::ErrorLog => String::from("error log"),
                                },
                            ]
                        })
                        .collect();
                    doc.table(&["Suite", "Result", "Decided by"], &rows);
                    for suite in run.suites.iter().filter(|suite| !suite.passed) {
                        doc.paragraph(&format!("{}:", suite.name));
                        doc.preformatted(&suite.excerpt);
                    }
                }
            }
            PassResult::Product(outcome) => {
                if let Availability::Missing(reason) = &outcome.package {
                    doc.paragraph(&format!("Product package unavailable: {reason}"));
                }
                for run in &outcome.runs {
                    run_heading(doc, format!("Product tests, {}", run.runtime.label()), &run.span);
                    let mut rows = Vec::new();
                    for (kind, products) in &run.products {
                        for (name, entry) in products {
                            match entry {
                                ProductEntry::Unavailable => rows.push(vec![
                                    kind.clone(),
                                    name.clone(),
                                    String::from("-"),
                                    String::from("Unavailable"),
                                ]),
                                ProductEntry::Actions(actions) => {
                                    rows.extend(actions.iter().map(|(action, result)| {
                                        vec![
                                            kind.clone(),
                                            name.clone(),
                                            action.as_str().to_string(),
                                            match result {
                                                ActionResult::Skipped => String::from("Skipped"),
                                                ActionResult::Ran(output) => format!(
                                                    "{} ({})",
                                                    result_label(output.success()),
                                                    output.status
                                                ),
                                            },
                                        ]
                                    }))
                                }
                            }
                        }
                    }
                    doc.table(&["Kind", "Product", "Action", "Result"], &rows);
                }
            }
            PassResult::PluginBuild(outcome) => {
                doc.table(
                    &["Step", "Result", "Status"],
                    &[step_row("plugin build", &outcome.output)],
                );
                if !outcome.output.success() {
                    doc.paragraph("Last lines of the build log:");
                    doc.preformatted(&outcome.log_tail);
                }
            }
        }
    }
}
