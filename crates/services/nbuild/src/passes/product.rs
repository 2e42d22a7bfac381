//! Build and run the products (test ports, protocol modules) with the
//! freshly installed toolchain.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use nb_config::{ProductAction, ProductDescriptor};
use nb_io::CommandOutput;
use nb_report::pass::{
    ActionResult, Availability, PassResult, ProductEntry, ProductOutcome, ProductResults,
    ProductRun, Runtime, Span, now,
};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::{PassContext, remove_matching, unpack_matching, write_log};
use crate::prelude::*;

pub const PACKAGE_PATTERN: &str = "vobtest-*.tar.bz2";
pub const PACKAGE_DIR: &str = "vobtest";
const ACTION_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Subdirectories of a product checked in this order, `src` being mandatory.
const PRODUCT_DIRS: [&str; 3] = ["test", "demo", "src"];

/// Runs every enabled action of the products found under a directory.
pub trait ProductBuilder: Send + Sync {
    fn build(
        &self,
        products_dir: &Path,
        log_dir: &Path,
        ctx: &PassContext,
        runtime: Runtime,
    ) -> ProductResults;
}

/// Drives the installed compiler, makefile generator and make.
pub struct DefaultProductBuilder;

impl ProductBuilder for DefaultProductBuilder {
    fn build(
        &self,
        products_dir: &Path,
        log_dir: &Path,
        ctx: &PassContext,
        runtime: Runtime,
    ) -> ProductResults {
        let mut results = ProductResults::new();
        for (kind, descriptors) in ctx.products() {
            let entries = results.entry(kind.clone()).or_insert_with(BTreeMap::new);
            for descriptor in descriptors {
                let dir = products_dir.join(kind).join(&descriptor.name);
                let entry = if dir.is_dir() {
                    let actions = ProductAction::ALL
                        .into_iter()
                        .map(|action| {
                            let result = if descriptor.is_enabled(action) {
                                let output = run_action(ctx, &dir, action, runtime);
                                if ctx.config.product_logs {
                                    keep_logs(log_dir, kind, descriptor, action, runtime, &output);
                                }
                                ActionResult::Ran(output)
                            } else {
                                ActionResult::Skipped
                            };
                            (action, result)
                        })
                        .collect();
                    ProductEntry::Actions(actions)
                } else {
                    warn!("{} - Product {kind}/{} is unavailable", ctx.label(), descriptor.name);
                    ProductEntry::Unavailable
                };
                if !entry.succeeded() {
                    error!("{} - Product {kind}/{} failed", ctx.label(), descriptor.name);
                }
                entries.insert(descriptor.name.clone(), entry);
            }
        }
        results
    }
}

/// Source files given to the compiler, sorted.
fn sources(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".ttcn") || name.ends_with(".asn"))
        .collect();
    files.sort();
    files
}

fn run_action(ctx: &PassContext, dir: &Path, action: ProductAction, runtime: Runtime) -> CommandOutput {
    let compiler = ctx.config.install_dir.join("bin/compiler").display().to_string();
    let alternate = runtime.is_alternate().then_some(String::from("-R"));
    match action {
        ProductAction::Semantic | ProductAction::Translate => {
            let mut args: Vec<String> = Vec::new();
            if action == ProductAction::Semantic {
                args.push(String::from("-s"));
            }
            args.extend(alternate);
            args.extend(sources(dir));
            ctx.command(compiler, args)
                .current_dir(dir)
                .timeout(ACTION_TIMEOUT)
                .output()
        }
        ProductAction::Compile | ProductAction::Run => {
            let make = &ctx.common().make_command;
            let mut steps = vec![
                format!("ttcn3_makefilegen -fp{} *", if runtime.is_alternate() { " -R" } else { "" }),
                format!("{make} clean"),
                format!("{make} dep"),
                format!("{make} -j{}", ctx.common().make_jobs),
            ];
            if action == ProductAction::Run {
                steps.push(format!("{make} run"));
            }
            ctx.shell(steps.join(" && "))
                .current_dir(dir)
                .timeout(ACTION_TIMEOUT)
                .output()
        }
    }
}

fn keep_logs(
    log_dir: &Path,
    kind: &str,
    descriptor: &ProductDescriptor,
    action: ProductAction,
    runtime: Runtime,
    output: &CommandOutput,
) {
    let stem = format!("{kind}_{}_{}", descriptor.name, action.as_str());
    let suffix = runtime.suffix();
    for (stream, lines) in [("stdout", &output.stdout), ("stderr", &output.stderr)] {
        let path = log_dir.join(format!("{stem}_{stream}.{suffix}"));
        let content = lines.iter().map(|line| format!("{line}\n")).collect::<String>();
        if let Err(err) = fs::write(&path, content) {
            warn!("Failed to write {} - {err}", path.display());
        }
    }
}

pub fn run(ctx: &PassContext, builder: &dyn ProductBuilder) -> PassResult {
    let begin = now();
    let label = ctx.label();
    let build_dir = ctx.build_dir();

    unpack_matching(ctx, build_dir, PACKAGE_PATTERN);
    let dir = build_dir.join(PACKAGE_DIR);
    let (package, runs) = if dir.is_dir() {
        let log_dir = ctx.log_dir().join("products");
        if let Err(err) = fs::create_dir_all(&log_dir) {
            warn!("{label} - Failed to create {} - {err}", log_dir.display());
        }
        let runs = Runtime::selected(ctx.config.alternate_runtime)
            .into_iter()
            .map(|runtime| {
                let begin = now();
                info!("{label} - Product tests with the {}", runtime.label());
                let products = builder.build(&dir, &log_dir, ctx, runtime);
                ProductRun {
                    runtime,
                    span: Span::since(begin),
                    products,
                }
            })
            .collect();
        (Availability::Available, runs)
    } else {
        let reason = format!("{} was not found after unpacking", dir.display());
        error!("{label} - {reason}");
        (Availability::Missing(reason), Vec::new())
    };
    remove_matching(build_dir, "vobtest*");

    PassResult::Product(ProductOutcome {
        span: Span::since(begin),
        package,
        runs,
    })
}

/// Copy every product of the catalog from the product checkout into
/// `target/<kind>/<product>`.
///
/// Of a product's `test`, `demo` and `src` directories the first one that
/// exists is copied; products without `src` are skipped.
/// Returns the number of products copied.
pub fn collect_products(
    products: &BTreeMap<String, Vec<ProductDescriptor>>,
    source_root: &Path,
    target: &Path,
) -> Result<usize> {
    let mut collected = 0;
    for (kind, descriptors) in products {
        for descriptor in descriptors {
            let product = source_root.join(kind).join(&descriptor.name);
            if !product.join("src").is_dir() {
                error!("Product {kind}/{} has no src directory", descriptor.name);
                continue;
            }
            let Some(chosen) = PRODUCT_DIRS
                .iter()
                .map(|dir| product.join(dir))
                .find(|dir| dir.is_dir())
            else {
                continue;
            };
            let destination = target.join(kind).join(&descriptor.name);
            debug!("Collecting {} into {}", chosen.display(), destination.display());
            copy_tree(&chosen, &destination)?;
            collected += 1;
        }
    }
    Ok(collected)
}

/// Recursive copy of `source` into `destination`, links followed.
pub fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative: PathBuf = entry
            .path()
            .strip_prefix(source)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::testing::catalog;

    #[test]
    fn test_collect_prefers_test_directory() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = catalog(dir.path());
        let product = dir.path().join("products/TestPorts/SIPmsg");
        fs::create_dir_all(product.join("src")).expect("Couldn't create src");
        fs::create_dir_all(product.join("test/sub")).expect("Couldn't create test");
        fs::write(product.join("src/SIPmsg.ttcn"), "module SIPmsg {}").expect("Couldn't write");
        fs::write(product.join("test/sub/SIP_Test.ttcn"), "module SIP_Test {}")
            .expect("Couldn't write");

        let target = dir.path().join("vobtest");
        let collected = collect_products(&catalog.products, &dir.path().join("products"), &target)
            .expect("Couldn't collect");
        assert_eq!(collected, 1);
        assert!(target.join("TestPorts/SIPmsg/sub/SIP_Test.ttcn").is_file());
        assert!(!target.join("TestPorts/SIPmsg/SIPmsg.ttcn").exists());
    }

    #[test]
    fn test_collect_skips_products_without_src() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = catalog(dir.path());
        fs::create_dir_all(dir.path().join("products/TestPorts/SIPmsg/demo"))
            .expect("Couldn't create demo");
        let collected = collect_products(
            &catalog.products,
            &dir.path().join("products"),
            &dir.path().join("vobtest"),
        )
        .expect("Couldn't collect");
        assert_eq!(collected, 0);
    }

    struct RecordingBuilder {
        calls: Mutex<Vec<(PathBuf, Runtime)>>,
    }

    impl ProductBuilder for RecordingBuilder {
        fn build(&self, products_dir: &Path, _: &Path, _: &PassContext, runtime: Runtime) -> ProductResults {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((products_dir.to_path_buf(), runtime));
            }
            ProductResults::new()
        }
    }

    #[test]
    fn test_missing_package_skips_builder() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = catalog(dir.path());
        let config = &catalog.configs["linux_gcc"];
        fs::create_dir_all(&config.build_dir).expect("Couldn't create build dir");
        let ctx = PassContext::new(&catalog, config, "lab1");
        let builder = RecordingBuilder {
            calls: Mutex::new(Vec::new()),
        };

        let result = run(&ctx, &builder);
        assert!(!result.succeeded());
        assert!(builder.calls.lock().expect("Poisoned").is_empty());
    }

    #[test]
    fn test_unavailable_and_skipped_products() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let catalog = catalog(dir.path());
        let config = &catalog.configs["linux_gcc"];
        let ctx = PassContext::new(&catalog, config, "lab1");
        let products = dir.path().join("vobtest");
        fs::create_dir_all(&products).expect("Couldn't create products");

        let results = DefaultProductBuilder.build(&products, dir.path(), &ctx, Runtime::Primary);
        assert_eq!(results["TestPorts"]["SIPmsg"], ProductEntry::Unavailable);
    }
}
