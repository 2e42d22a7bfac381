//! Unpack, compile and install the toolchain under test.

use std::{fs, io, os::unix::fs::symlink, path::Path, time::Duration};

use nb_report::pass::{BuildOutcome, BuildSteps, PassResult, Span, now};
use tracing::{error, info, warn};

use super::{PassContext, unpack_matching};

const STEP_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub fn run(ctx: &PassContext) -> PassResult {
    let begin = now();
    let label = ctx.label();
    if let Err(err) = fs::create_dir_all(ctx.log_dir()) {
        error!("{label} - Failed to create {} - {err}", ctx.log_dir().display());
    }

    unpack_matching(ctx, ctx.build_dir(), &ctx.source_package());
    let source_dir = ctx.source_dir();
    if !source_dir.is_dir() {
        let reason = format!("{} was not found after unpacking", source_dir.display());
        error!("{label} - {reason}");
        return PassResult::Build(BuildOutcome {
            span: Span::since(begin),
            steps: BuildSteps::SourceMissing(reason),
        });
    }

    // Unpacked timestamps come from the master's clock.
    let touched = ctx
        .shell("find . -exec touch {} +")
        .current_dir(&source_dir)
        .timeout(STEP_TIMEOUT)
        .output();
    if !touched.success() {
        warn!("{label} - Failed to touch the source tree - status {}", touched.status);
    }

    let make = |args: Vec<String>| {
        ctx.command(&ctx.common().make_command, args)
            .current_dir(&source_dir)
            .timeout(STEP_TIMEOUT)
            .output()
    };
    info!("{label} - Building");
    let dependencies = make(vec![String::from("dep")]);
    let compile = make(vec![format!("-j{}", ctx.common().make_jobs)]);
    let install = make(vec![String::from("install")]);

    let outcome = BuildOutcome {
        span: Span::since(begin),
        steps: BuildSteps::Ran {
            dependencies,
            compile,
            install,
        },
    };
    if outcome.succeeded() {
        info!("{label} - Build succeeded");
        if ctx.config.foa {
            if let Some(foa_dir) = &ctx.config.foa_dir {
                if let Err(err) = link_foa(&ctx.config.install_dir, foa_dir) {
                    error!("{label} - Failed to link {} - {err}", foa_dir.display());
                }
            }
        }
    } else {
        error!("{label} - Build failed, the test passes are skipped");
    }
    PassResult::Build(outcome)
}

/// Point the stable `foa_dir` at a freshly installed tree.
///
/// A stale target is removed first. When that fails the new link is still
/// created next to it and swapped in by rename.
pub fn link_foa(install_dir: &Path, foa_dir: &Path) -> io::Result<()> {
    if install_dir == foa_dir {
        return Ok(());
    }
    if let Ok(metadata) = fs::symlink_metadata(foa_dir) {
        let removed = if metadata.is_dir() {
            fs::remove_dir_all(foa_dir)
        } else {
            fs::remove_file(foa_dir)
        };
        if let Err(err) = removed {
            warn!("Failed to remove {} - {err}", foa_dir.display());
        }
    }

    let mut staged = foa_dir.as_os_str().to_owned();
    staged.push(".new");
    let staged = Path::new(&staged);
    if fs::symlink_metadata(staged).is_ok() {
        fs::remove_file(staged)?;
    }
    symlink(install_dir, staged)?;
    fs::rename(staged, foa_dir)
}
