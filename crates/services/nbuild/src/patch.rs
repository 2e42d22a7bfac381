//! Adapt a freshly checked out source tree to one configuration.
//!
//! Every rewritten file keeps its pristine copy next to it with an `.orig`
//! suffix.

use std::{
    fs, io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use nb_config::BuildConfig;
use tracing::{debug, warn};

use crate::prelude::*;

/// What happens to one line of a rewritten file.
enum Edit {
    Keep,
    Drop,
    Replace(String),
}

/// Whether `line` assigns `name`, with `=` or `:=`.
fn assigns(line: &str, name: &str) -> bool {
    line.strip_prefix(name).is_some_and(|rest| {
        let rest = rest.trim_start();
        rest.starts_with(":=") || rest.starts_with('=')
    })
}

fn orig_path(path: &Path) -> PathBuf {
    let mut orig = path.as_os_str().to_owned();
    orig.push(".orig");
    PathBuf::from(orig)
}

/// Move `path` aside and write it back line by line through `edit`.
fn rewrite(path: &Path, edit: impl Fn(&str) -> Edit) -> io::Result<()> {
    let orig = orig_path(path);
    fs::rename(path, &orig)?;
    let content = fs::read_to_string(&orig)?;
    let mut rewritten = String::with_capacity(content.len());
    for line in content.lines() {
        match edit(line) {
            Edit::Keep => rewritten.push_str(line),
            Edit::Drop => continue,
            Edit::Replace(line) => rewritten.push_str(&line),
        }
        rewritten.push('\n');
    }
    fs::write(path, rewritten)?;
    fs::set_permissions(path, fs::metadata(&orig)?.permissions())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Apply every rewrite the configuration asks for to `source_dir`.
///
/// A missing `Makefile.cfg` is fatal, the other files are optional.
pub fn configure(config: &BuildConfig, source_dir: &Path) -> Result<()> {
    if config.functest {
        configure_function_tests(config, source_dir);
    }
    if config.platform == "LINUX" {
        let makefile = source_dir.join("mctr2/mctr/Makefile");
        if makefile.is_file() {
            let result = rewrite(&makefile, |line| {
                if assigns(line, "LINUX_CLI_LIBS") && line.trim_end().ends_with('=') {
                    Edit::Replace(String::from("LINUX_CLI_LIBS := -lncurses"))
                } else {
                    Edit::Keep
                }
            });
            warn_on_error(&makefile, result);
        }
    }

    let makefile_cfg = source_dir.join("Makefile.cfg");
    if !makefile_cfg.is_file() {
        return Err(Error::MissingBuildFile(makefile_cfg.display().to_string()));
    }
    rewrite(&makefile_cfg, |line| configure_build_line(config, line))?;

    if config.regtest {
        configure_regression_tests(config, source_dir);
    }
    configure_pdfs(config, source_dir);
    Ok(())
}

fn compiler_path(config: &BuildConfig, name: &Option<String>, default: &str) -> Option<String> {
    let gcc_dir = config.gcc_dir.as_ref()?;
    let compiler = name.as_deref().unwrap_or(default);
    Some(gcc_dir.join("bin").join(compiler).display().to_string())
}

fn configure_build_line(config: &BuildConfig, line: &str) -> Edit {
    let set = |name: &str, operator: &str, value: &Option<String>| {
        value
            .as_ref()
            .map_or(Edit::Keep, |value| Edit::Replace(format!("{name} {operator} {value}")))
    };
    if assigns(line, "TTCN3_DIR") {
        Edit::Drop
    } else if assigns(line, "DEBUG") {
        Edit::Replace(format!("DEBUG := {}", yes_no(config.debug)))
    } else if assigns(line, "# PLATFORM") || assigns(line, "PLATFORM") {
        Edit::Replace(format!("PLATFORM := {}", config.platform))
    } else if assigns(line, "JNI") {
        Edit::Replace(format!("JNI := {}", yes_no(config.jni)))
    } else if assigns(line, "GUI") {
        Edit::Replace(format!("GUI := {}", yes_no(config.gui)))
    } else if assigns(line, "FLEX") {
        set("FLEX", ":=", &config.flex)
    } else if assigns(line, "BISON") {
        set("BISON", ":=", &config.bison)
    } else if assigns(line, "CC") {
        set("CC", ":=", &compiler_path(config, &config.cc, "gcc"))
    } else if assigns(line, "CXX") {
        set("CXX", ":=", &compiler_path(config, &config.cxx, "g++"))
    } else if assigns(line, "JDKDIR") {
        set("JDKDIR", ":=", &config.jdk_dir)
    } else if assigns(line, "QTDIR") {
        set("QTDIR", "=", &config.qt_dir)
    } else if assigns(line, "XMLDIR") {
        set("XMLDIR", "=", &config.xml_dir)
    } else if assigns(line, "OPENSSL_DIR") {
        set("OPENSSL_DIR", "=", &config.openssl_dir)
    } else if assigns(line, "LDFLAGS") {
        set("LDFLAGS", "=", &config.ldflags)
    } else if assigns(line, "COMPILERFLAGS") {
        set("COMPILERFLAGS", "=", &config.compiler_flags)
    } else {
        Edit::Keep
    }
}

fn configure_function_tests(config: &BuildConfig, source_dir: &Path) {
    let suites = source_dir.join("function_test");
    for suite in ["BER_EncDec", "RAW_EncDec", "Text_EncDec"] {
        let makefile = suites.join(suite).join("Makefile");
        if !makefile.is_file() {
            warn!("{} is missing", makefile.display());
            continue;
        }
        let result = rewrite(&makefile, |line| {
            if assigns(line, "PLATFORM") {
                Edit::Replace(format!("PLATFORM = {}", config.platform))
            } else if assigns(line, "CXX") {
                config
                    .cxx
                    .as_ref()
                    .map_or(Edit::Keep, |cxx| Edit::Replace(format!("CXX = {cxx}")))
            } else {
                Edit::Keep
            }
        });
        warn_on_error(&makefile, result);
    }

    // The encoder suite runs the fast variant of its test script.
    let run_test = suites.join("BER_EncDec/run_test");
    if run_test.is_file() {
        let result = rewrite(&run_test, |line| {
            if line.contains("TD.script") {
                Edit::Replace(line.replace("TD.script", "TD.fast_script"))
            } else {
                Edit::Keep
            }
        })
        .and_then(|()| fs::set_permissions(&run_test, fs::Permissions::from_mode(0o755)));
        warn_on_error(&run_test, result);
    }
}

fn configure_regression_tests(config: &BuildConfig, source_dir: &Path) {
    let makefile = source_dir.join("Makefile.regression");
    if makefile.is_file() {
        let result = rewrite(&makefile, |line| {
            let set = |name: &str, value: Option<String>| {
                value.map_or(Edit::Keep, |value| Edit::Replace(format!("{name} := {value}")))
            };
            if assigns(line, "TTCN3_DIR") {
                Edit::Drop
            } else if assigns(line, "CC") {
                set("CC", compiler_path(config, &config.cc, "gcc"))
            } else if assigns(line, "CXX") {
                set("CXX", compiler_path(config, &config.cxx, "g++"))
            } else if assigns(line, "XMLDIR") {
                set("XMLDIR", config.xml_dir.clone())
            } else {
                Edit::Keep
            }
        });
        warn_on_error(&makefile, result);
    } else {
        warn!("{} is missing", makefile.display());
    }

    if !config.xsd_tests {
        let makefile = source_dir.join("regression_test/Makefile");
        if makefile.is_file() {
            let result = rewrite(&makefile, |line| {
                if line.contains("xsdConverter") {
                    Edit::Replace(line.replace("xsdConverter", ""))
                } else {
                    Edit::Keep
                }
            });
            warn_on_error(&makefile, result);
        }
    }
}

/// Ship prebuilt user guides, or empty placeholders for each document.
fn configure_pdfs(config: &BuildConfig, source_dir: &Path) {
    let Some(pdf_dir) = &config.pdf_dir else {
        return;
    };
    let usrguide = source_dir.join("usrguide");
    let Ok(entries) = fs::read_dir(if pdf_dir.is_dir() { pdf_dir } else { &usrguide }) else {
        warn!("Neither {} nor {} can be read", pdf_dir.display(), usrguide.display());
        return;
    };
    for path in entries.filter_map(|entry| entry.ok()).map(|entry| entry.path()) {
        let extension = path.extension().and_then(|extension| extension.to_str());
        let result = match (pdf_dir.is_dir(), extension) {
            (true, Some("pdf")) => path
                .file_name()
                .map_or(Ok(()), |name| fs::copy(&path, usrguide.join(name)).map(|_| ())),
            (false, Some("doc")) => fs::write(path.with_extension("pdf"), ""),
            _ => continue,
        };
        warn_on_error(&path, result);
    }
    debug!("User guides prepared in {}", usrguide.display());
}

fn warn_on_error(path: &Path, result: io::Result<()>) {
    if let Err(err) = result {
        warn!("Failed to patch {} - {err}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::config;

    const MAKEFILE_CFG: &str = "\
TTCN3_DIR :=
# PLATFORM = SOLARIS8
DEBUG := yes
JNI := yes
GUI = no
FLEX := flex
CC := gcc
CXX := g++
XMLDIR = /usr
LDFLAGS =
OTHER = untouched
";

    #[test]
    fn test_assigns() {
        assert!(assigns("CC := gcc", "CC"));
        assert!(assigns("CC= gcc", "CC"));
        assert!(!assigns("CCFLAGS = -O2", "CC"));
        assert!(!assigns("CXX := g++", "CC"));
    }

    #[test]
    fn test_configure_makefile_cfg() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        fs::write(dir.path().join("Makefile.cfg"), MAKEFILE_CFG).expect("Couldn't write");
        let mut config = config(dir.path());
        config.regtest = false;
        config.functest = false;
        config.gcc_dir = Some("/opt/gcc".into());
        config.xml_dir = Some(String::from("/opt/libxml2"));

        configure(&config, dir.path()).expect("Couldn't configure");
        let patched = fs::read_to_string(dir.path().join("Makefile.cfg")).expect("Couldn't read");
        assert_eq!(
            patched,
            "PLATFORM := LINUX\n\
             DEBUG := no\n\
             JNI := no\n\
             GUI := no\n\
             FLEX := flex\n\
             CC := /opt/gcc/bin/gcc\n\
             CXX := /opt/gcc/bin/g++\n\
             XMLDIR = /opt/libxml2\n\
             LDFLAGS =\n\
             OTHER = untouched\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("Makefile.cfg.orig")).expect("Couldn't read"),
            MAKEFILE_CFG
        );
    }

    #[test]
    fn test_missing_makefile_cfg_is_fatal() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let result = configure(&config(dir.path()), dir.path());
        assert!(matches!(result, Err(Error::MissingBuildFile(_))));
    }

    #[test]
    fn test_function_test_makefiles() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        fs::write(dir.path().join("Makefile.cfg"), "").expect("Couldn't write");
        let ber = dir.path().join("function_test/BER_EncDec");
        fs::create_dir_all(&ber).expect("Couldn't create suite");
        fs::write(ber.join("Makefile"), "PLATFORM = SOLARIS\nCXX = CC\n").expect("Couldn't write");
        fs::write(ber.join("run_test"), "./BER_EncDec_TD.script\n").expect("Couldn't write");
        let mut config = config(dir.path());
        config.regtest = false;

        configure(&config, dir.path()).expect("Couldn't configure");
        assert_eq!(
            fs::read_to_string(ber.join("Makefile")).expect("Couldn't read"),
            "PLATFORM = LINUX\nCXX = g++\n"
        );
        assert_eq!(
            fs::read_to_string(ber.join("run_test")).expect("Couldn't read"),
            "./BER_EncDec_TD.fast_script\n"
        );
        let mode = fs::metadata(ber.join("run_test")).expect("No run_test").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_pdf_placeholders() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        fs::write(dir.path().join("Makefile.cfg"), "").expect("Couldn't write");
        let usrguide = dir.path().join("usrguide");
        fs::create_dir_all(&usrguide).expect("Couldn't create usrguide");
        fs::write(usrguide.join("userguide.doc"), "doc").expect("Couldn't write");
        let mut config = config(dir.path());
        config.regtest = false;
        config.functest = false;
        config.pdf_dir = Some(dir.path().join("no-such-dir"));

        configure(&config, dir.path()).expect("Couldn't configure");
        assert!(usrguide.join("userguide.pdf").is_file());
    }
}
