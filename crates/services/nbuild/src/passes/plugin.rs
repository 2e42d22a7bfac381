//! Eclipse plugin build.

use std::{fs, time::Duration};

use nb_report::pass::{PassResult, PluginBuildOutcome, Span, now};
use tracing::{error, info, warn};

use super::PassContext;

const BUILD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const TOOL_LOG: &str = "mylog.log";
const LOG_TAIL_LINES: usize = 20;

pub fn run(ctx: &PassContext) -> PassResult {
    let begin = now();
    let label = ctx.label();
    let dir = ctx.source_dir().join("eclipse/automatic_build");
    info!("{label} - Building the Eclipse plugins");

    let output = ctx
        .command(
            "ant",
            vec!["-d", "-l", TOOL_LOG, "-f", "build_main.xml", "updatesite.experimental"],
        )
        .current_dir(&dir)
        .timeout(BUILD_TIMEOUT)
        .output();
    if !output.success() {
        error!("{label} - Building the Eclipse plugins failed - status {}", output.status);
    }

    let log_tail = match fs::read_to_string(dir.join(TOOL_LOG)) {
        Ok(content) => {
            let kept = ctx.log_dir().join(format!("eclipse-{TOOL_LOG}"));
            if let Err(err) = fs::write(&kept, &content) {
                warn!("{label} - Failed to keep {} - {err}", kept.display());
            }
            let lines: Vec<&str> = content.lines().collect();
            lines[lines.len().saturating_sub(LOG_TAIL_LINES)..]
                .iter()
                .map(|line| line.to_string())
                .collect()
        }
        Err(err) => {
            warn!("{label} - No plugin build log - {err}");
            Vec::new()
        }
    };

    PassResult::PluginBuild(PluginBuildOutcome {
        span: Span::since(begin),
        output,
        log_tail,
    })
}
