//! The published site: one timestamped directory per cycle plus an index,
//! a menu and a stylesheet at the root.
//!
//! ```text
//! html_dir/
//!   index.css  index.html  menu.html  latest -> 20261016_020000
//!   20261016_020000/report.txt
//!   20261016_020000/<config>/<slave>/report.{txt,html,csv}
//!   20261010_020000.tar.bz2
//! ```

use std::{
    fmt::Write as _,
    fs,
    path::Path,
    sync::LazyLock,
    time::Duration,
};

use chrono::NaiveDateTime;
use nb_io::{Runner, Transport};
use regex::Regex;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::{prelude::*, render::escape};

/// Name format of a build directory.
pub const BUILD_DIR_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name of the link to the newest build.
pub const LATEST_LINK: &str = "latest";

const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(3600);

static BUILD_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}_\d{6}$").expect("Valid regex"));
static BUILD_ARCHIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{8}_\d{6})\.tar\.bz2$").expect("Valid regex"));

const STYLESHEET: &str = "\
body { font-family: sans-serif; font-size: 10pt; margin: 1em; }
h1 { font-size: 14pt; }
h2 { font-size: 12pt; border-bottom: 1px solid #888; }
h3 { font-size: 11pt; }
table { border-collapse: collapse; margin: 0.5em 0; }
th, td { border: 1px solid #bbb; padding: 2px 8px; text-align: left; }
td.success { background: #c8f0c8; }
td.failure { background: #f4c0c0; }
td.disabled { background: #e8e8e8; }
td.lost { background: #f8e0a0; }
pre { background: #f6f6f6; padding: 4px; overflow-x: auto; }
ul.menu { list-style: none; padding-left: 0.5em; }
";

/// Name of the build directory started at `start`.
pub fn build_dir_name(start: NaiveDateTime) -> String {
    start.format(BUILD_DIR_FORMAT).to_string()
}

fn build_time(name: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(name, BUILD_DIR_FORMAT).ok()
}

fn sorted_names(root: &Path, pattern: &Regex, want_dir: bool) -> Vec<String> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_type()
                .is_ok_and(|kind| kind.is_dir() == want_dir && !kind.is_symlink())
        })
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| pattern.is_match(name))
        .collect();
    names.sort_by(|a, b| b.cmp(a));
    names
}

/// Build directories below `root`, newest first.
pub fn list_build_dirs(root: &Path) -> Vec<String> {
    sorted_names(root, &BUILD_DIR, true)
}

/// Compressed builds below `root`, newest first.
pub fn list_archives(root: &Path) -> Vec<String> {
    sorted_names(root, &BUILD_ARCHIVE, false)
}

/// Per-slave reports of a build, as `(config, slave)`.
pub fn list_slave_reports(build: &Path) -> Vec<(String, String)> {
    WalkDir::new(build)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir() && entry.path().join("report.html").exists())
        .filter_map(|entry| {
            let slave = entry.file_name().to_str()?.to_string();
            let config = entry.path().parent()?.file_name()?.to_str()?.to_string();
            Some((config, slave))
        })
        .collect()
}

pub fn write_css(html_dir: &Path) -> Result<()> {
    fs::write(html_dir.join("index.css"), STYLESHEET)?;
    Ok(())
}

/// Frameset with the menu on the left and the newest summary on the right.
pub fn publish_index(html_dir: &Path, latest_build: &str) -> Result<()> {
    let mut out = String::new();
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html>\n<head>\n<meta charset=\"utf-8\">")?;
    writeln!(out, "<title>Nightly builds</title>")?;
    writeln!(out, "<link rel=\"stylesheet\" href=\"index.css\">\n</head>")?;
    writeln!(out, "<frameset cols=\"20%,80%\">")?;
    writeln!(out, "<frame src=\"menu.html\" name=\"menu\">")?;
    writeln!(
        out,
        "<frame src=\"{}/report.txt\" name=\"content\">",
        escape(latest_build)
    )?;
    writeln!(out, "</frameset>\n</html>")?;
    fs::write(html_dir.join("index.html"), out)?;
    Ok(())
}

/// List every build, newest first, with links to its reports.
pub fn publish_menu(html_dir: &Path) -> Result<()> {
    let mut out = String::new();
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html>\n<head>\n<meta charset=\"utf-8\">")?;
    writeln!(out, "<link rel=\"stylesheet\" href=\"index.css\">\n</head>\n<body>")?;
    for build in list_build_dirs(html_dir) {
        let build = escape(&build);
        writeln!(out, "<h3>{build}</h3>\n<ul class=\"menu\">")?;
        writeln!(
            out,
            "<li><a href=\"{build}/report.txt\" target=\"content\">Summary</a></li>"
        )?;
        for (config, slave) in list_slave_reports(&html_dir.join(&build)) {
            let (config, slave) = (escape(&config), escape(&slave));
            writeln!(
                out,
                "<li><a href=\"{build}/{config}/{slave}/report.html\" target=\"content\">{slave}/{config}</a></li>"
            )?;
        }
        writeln!(out, "</ul>")?;
    }
    let archives = list_archives(html_dir);
    if !archives.is_empty() {
        writeln!(out, "<h3>Archived</h3>\n<ul class=\"menu\">")?;
        for archive in archives {
            writeln!(out, "<li>{}</li>", escape(&archive))?;
        }
        writeln!(out, "</ul>")?;
    }
    writeln!(out, "</body>\n</html>")?;
    fs::write(html_dir.join("menu.html"), out)?;
    Ok(())
}

/// Point `html_dir/latest` at `build`.
pub fn update_latest_link(html_dir: &Path, build: &str) -> Result<()> {
    let link = html_dir.join(LATEST_LINK);
    if fs::symlink_metadata(&link).is_ok() {
        fs::remove_file(&link)?;
    }
    std::os::unix::fs::symlink(build, &link)?;
    Ok(())
}

/// Where archives go once they are too old for the master.
pub struct CleanupDestination<'a> {
    pub transport: &'a dyn Transport,
    pub dir: &'a str,
}

/// Age limits of published builds, in days.
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    pub archive_days: i64,
    pub cleanup_days: i64,
}

/// Compress old build directories and move old archives away.
///
/// Failures are logged; the directory or archive stays where it is.
pub fn backup_logs(
    html_dir: &Path,
    now: NaiveDateTime,
    retention: Retention,
    cleanup: Option<&CleanupDestination>,
) {
    let age = |name: &str| build_time(name).map(|time| (now - time).num_days());

    for build in list_build_dirs(html_dir) {
        if !age(&build).is_some_and(|days| days > retention.archive_days) {
            continue;
        }
        let archive = format!("{build}.tar.bz2");
        let output = Runner::new("tar", vec!["cjf", archive.as_str(), build.as_str()])
            .current_dir(html_dir)
            .timeout(ARCHIVE_TIMEOUT)
            .output();
        if !output.success() {
            error!("Failed to archive build {build} - status {}", output.status);
            continue;
        }
        match fs::remove_dir_all(html_dir.join(&build)) {
            Ok(()) => info!("Build {build} archived"),
            Err(err) => error!("Build {build} archived but not removed - {err}"),
        }
    }

    for archive in list_archives(html_dir) {
        let build = archive.trim_end_matches(".tar.bz2");
        if !age(build).is_some_and(|days| days > retention.cleanup_days) {
            continue;
        }
        let Some(cleanup) = cleanup else {
            warn!("Archive {archive} is due for cleanup but no cleanup slave is configured");
            continue;
        };
        let path = html_dir.join(&archive);
        let output = cleanup.transport.copy_to(&path, cleanup.dir);
        if !output.success() {
            error!(
                "Failed to move {archive} to {}:{} - status {}",
                cleanup.transport.destination(),
                cleanup.dir,
                output.status
            );
            continue;
        }
        if let Err(err) = fs::remove_file(&path) {
            error!("Archive {archive} copied but not removed - {err}");
        }
    }
}

/// Refresh the stylesheet, the archives, the index and the menu.
pub fn publish_html(
    html_dir: &Path,
    build: &str,
    now: NaiveDateTime,
    retention: Retention,
    cleanup: Option<&CleanupDestination>,
) -> Result<()> {
    fs::create_dir_all(html_dir)?;
    write_css(html_dir)?;
    backup_logs(html_dir, now, retention, cleanup);
    publish_index(html_dir, build)?;
    publish_menu(html_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .and_then(|d| d.and_hms_opt(2, 0, 0))
            .expect("Valid timestamp")
    }

    fn make_build(root: &Path, start: NaiveDateTime, slave: &str) -> String {
        let name = build_dir_name(start);
        let dir = root.join(&name).join("linux_gcc").join(slave);
        fs::create_dir_all(&dir).expect("Couldn't create build");
        fs::write(dir.join("report.html"), "<html></html>").expect("Couldn't write report");
        name
    }

    #[test]
    fn test_builds_are_listed_newest_first() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        make_build(dir.path(), at(14), "lab1");
        make_build(dir.path(), at(16), "lab1");
        fs::create_dir_all(dir.path().join("not_a_build")).expect("Couldn't create dir");
        assert_eq!(
            list_build_dirs(dir.path()),
            vec!["20261016_020000", "20261014_020000"]
        );
    }

    #[test]
    fn test_menu_and_index() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let older = make_build(dir.path(), at(15), "lab1");
        let newer = make_build(dir.path(), at(16), "lab2");
        let retention = Retention {
            archive_days: 4,
            cleanup_days: 8,
        };
        publish_html(dir.path(), &newer, at(16), retention, None).expect("Couldn't publish");
        update_latest_link(dir.path(), &newer).expect("Couldn't link");
        update_latest_link(dir.path(), &newer).expect("Couldn't relink");

        let menu = fs::read_to_string(dir.path().join("menu.html")).expect("Missing menu");
        let newer_at = menu.find(&newer).expect("Newer build listed");
        let older_at = menu.find(&older).expect("Older build listed");
        assert!(newer_at < older_at);
        assert!(menu.contains(&format!("{newer}/linux_gcc/lab2/report.html")));

        let index = fs::read_to_string(dir.path().join("index.html")).expect("Missing index");
        assert!(index.contains(&format!("{newer}/report.txt")));
        assert!(dir.path().join("index.css").exists());
        assert_eq!(
            fs::read_link(dir.path().join(LATEST_LINK)).expect("Missing link"),
            Path::new(&newer)
        );
    }

    #[test]
    fn test_old_builds_are_archived() {
        let dir = tempfile::tempdir().expect("Couldn't create temp dir");
        let old = make_build(dir.path(), at(1), "lab1");
        let recent = make_build(dir.path(), at(15), "lab1");
        let retention = Retention {
            archive_days: 4,
            cleanup_days: 30,
        };
        backup_logs(dir.path(), at(16), retention, None);
        assert!(!dir.path().join(&old).exists());
        assert!(dir.path().join(format!("{old}.tar.bz2")).exists());
        assert!(dir.path().join(&recent).exists());
        assert_eq!(list_archives(dir.path()), vec![format!("{old}.tar.bz2")]);
    }
}
