//! Throughput history plots of the performance pass.
//!
//! For every (runtime, configuration) pair the figures of all published
//! builds are gathered into `perftest-stats-<rt>.csv` (one line per build:
//! the build name followed by four figures per call rate) and rendered to
//! `perftest-stats-<rt>.svg` by the plotting tool.

use std::{
    collections::BTreeMap,
    fmt::Write as _,
    fs,
    path::Path,
    time::Duration,
};

use nb_io::Runner;
use tracing::{debug, error, info};

use crate::{pass::Runtime, prelude::*, site::list_build_dirs, verdict::throughput_figures};

const PLOT_TIMEOUT: Duration = Duration::from_secs(300);

/// Figures per call rate on a history line.
pub const FIGURES_PER_POINT: usize = 4;

/// Runtime suffix and configuration name.
pub type SeriesKey = (String, String);

/// Build name to the concatenated figures of that build.
pub type Series = BTreeMap<String, Vec<String>>;

pub fn stats_name(runtime_suffix: &str, extension: &str) -> String {
    format!("perftest-stats-{runtime_suffix}.{extension}")
}

fn subdirs(dir: &Path) -> Vec<(String, std::path::PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<(String, std::path::PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .filter_map(|entry| Some((entry.file_name().into_string().ok()?, entry.path())))
        .collect();
    dirs.sort();
    dirs
}

fn parse_stats(content: &str) -> Series {
    content
        .lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            let build = words.next()?.to_string();
            let figures: Vec<String> = words.map(str::to_string).collect();
            (!figures.is_empty()).then_some((build, figures))
        })
        .collect()
}

/// Figures of one slave's raw load generator outputs, ordered by call rate.
fn raw_figures(slave_dir: &Path, runtime_suffix: &str) -> Vec<String> {
    let prefix = format!("perftest.{runtime_suffix}-");
    let Ok(entries) = fs::read_dir(slave_dir) else {
        return Vec::new();
    };
    let mut points: Vec<(u32, std::path::PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let cps = name.strip_prefix(&prefix)?.parse().ok()?;
            Some((cps, entry.path()))
        })
        .collect();
    points.sort();
    let mut figures = Vec::new();
    for (cps, path) in points {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        match throughput_figures(&lines) {
            Some(values) => figures.extend(values),
            None => debug!("No throughput figures at {cps} CPS in {}", path.display()),
        }
    }
    figures
}

/// Gather the history of every series from the published builds.
///
/// Stats files carried by a build provide the older history; raw outputs
/// of a build take precedence for that build's own line.
pub fn collect_data(html_dir: &Path) -> BTreeMap<SeriesKey, Series> {
    let mut history: BTreeMap<SeriesKey, Series> = BTreeMap::new();
    let mut builds = list_build_dirs(html_dir);
    builds.reverse();
    for build in builds {
        for (config, config_dir) in subdirs(&html_dir.join(&build)) {
            for runtime in [Runtime::Primary, Runtime::Alternate] {
                let rt = runtime.suffix();
                let key = (rt.to_string(), config.clone());
                if let Ok(content) = fs::read_to_string(config_dir.join(stats_name(rt, "csv"))) {
                    let series = history.entry(key.clone()).or_default();
                    for (date, figures) in parse_stats(&content) {
                        series.entry(date).or_insert(figures);
                    }
                }
                for (_, slave_dir) in subdirs(&config_dir) {
                    let figures = raw_figures(&slave_dir, rt);
                    if !figures.is_empty() {
                        history
                            .entry(key.clone())
                            .or_default()
                            .insert(build.clone(), figures);
                    }
                }
            }
        }
    }
    history.retain(|_, series| !series.is_empty());
    history
}

fn plot_script(key: &SeriesKey, series: &Series) -> String {
    let (rt, config) = key;
    let points = series
        .values()
        .map(|figures| figures.len() / FIGURES_PER_POINT)
        .max()
        .unwrap_or(0);
    let mut script = String::new();
    let _ = writeln!(script, "set terminal svg size 800,480");
    let _ = writeln!(script, "set output '{}'", stats_name(rt, "svg"));
    let _ = writeln!(script, "set title '{config} ({rt})'");
    let _ = writeln!(script, "set xdata time");
    let _ = writeln!(script, "set timefmt '%Y%m%d_%H%M%S'");
    let _ = writeln!(script, "set format x '%m-%d'");
    let _ = writeln!(script, "set ylabel 'Entities/s'");
    let _ = writeln!(script, "set key left top");
    let curves: Vec<String> = (0..points)
        .map(|point| {
            format!(
                "'{}' using 1:{} title 'rate {}' with linespoints",
                stats_name(rt, "csv"),
                2 + point * FIGURES_PER_POINT + FIGURES_PER_POINT - 1,
                point + 1
            )
        })
        .collect();
    if !curves.is_empty() {
        let _ = writeln!(script, "plot {}", curves.join(", \\\n     "));
    }
    script
}

/// Write the stats file and plot script of every series into `build` and
/// run the plotting tool on them.
pub fn plot(
    html_dir: &Path,
    build: &str,
    history: &BTreeMap<SeriesKey, Series>,
    plot_command: &str,
) -> Result<()> {
    for (key, series) in history {
        let (rt, config) = key;
        let target = html_dir.join(build).join(config);
        fs::create_dir_all(&target)?;

        let mut data = String::new();
        for (date, figures) in series {
            writeln!(data, "{date} {}", figures.join(" "))?;
        }
        fs::write(target.join(stats_name(rt, "csv")), data)?;
        let script_name = stats_name(rt, "cfg");
        fs::write(target.join(&script_name), plot_script(key, series))?;

        let output = Runner::new(plot_command, vec![script_name.as_str()])
            .current_dir(&target)
            .timeout(PLOT_TIMEOUT)
            .output();
        if output.success() {
            info!("{config} - {rt} throughput plot updated");
        } else {
            error!(
                "{config} - {rt} - `{plot_command}` failed with status {}",
                output.status
            );
        }
    }
    Ok(())
}
