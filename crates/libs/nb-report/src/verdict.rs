//! Scanning tool output for verdicts.

use std::sync::LazyLock;

use regex::Regex;

static VERDICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Verdict stat.*pass \((\d+)(?:\.\d+)?%").expect("Valid regex")
});
static TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Total number of.*:\s*(\d+)\s*$").expect("Valid regex"));
static PASSED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*PASSED.*cases:\s*(\d+)\s*$").expect("Valid regex"));

/// Marker of the line that carries the load generator's throughput figures.
pub const THROUGHPUT_MARKER: &str = "=>>>Entities/Time";

/// Result of looking for verdict lines in an execution log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerdictScan {
    /// Number of verdict lines seen.
    pub verdicts: usize,
    /// Verdict lines below 100% that were not expected to fail.
    pub failing_lines: Vec<String>,
    /// Verdict lines below 100% excused by an expected-failure marker.
    pub expected_failures: usize,
}

impl VerdictScan {
    pub fn passed(&self) -> bool {
        self.failing_lines.is_empty()
    }
}

/// Look for `Verdict stat... pass (NN.N%)` lines.
///
/// A percentage other than 100 fails the scan unless the line right before
/// it contains one of `expected_failure_markers`.
pub fn scan_verdicts<S: AsRef<str>>(lines: &[S], expected_failure_markers: &[String]) -> VerdictScan {
    let mut scan = VerdictScan::default();
    for (index, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        let Some(captures) = VERDICT.captures(line) else {
            continue;
        };
        scan.verdicts += 1;
        if &captures[1] == "100" {
            continue;
        }
        let expected = index
            .checked_sub(1)
            .map(|previous| lines[previous].as_ref())
            .is_some_and(|previous| {
                expected_failure_markers
                    .iter()
                    .any(|marker| previous.contains(marker.as_str()))
            });
        if expected {
            scan.expected_failures += 1;
        } else {
            scan.failing_lines.push(line.to_string());
        }
    }
    scan
}

/// Decide a count-format suite log: the last "Total number of ...: N" must
/// equal the last "PASSED ... cases: M". A log missing either line fails.
///
/// Returns the verdict and the lines it was based on.
pub fn evaluate_count_log<S: AsRef<str>>(lines: &[S]) -> (bool, Vec<String>) {
    let mut total = None;
    let mut passed = None;
    for line in lines.iter().rev().map(AsRef::as_ref) {
        if total.is_none() {
            if let Some(captures) = TOTAL.captures(line) {
                total = Some((captures[1].to_string(), line.to_string()));
            }
        }
        if passed.is_none() {
            if let Some(captures) = PASSED.captures(line) {
                passed = Some((captures[1].to_string(), line.to_string()));
            }
        }
        if total.is_some() && passed.is_some() {
            break;
        }
    }
    match (total, passed) {
        (Some((total, total_line)), Some((passed, passed_line))) => {
            (total == passed, vec![total_line, passed_line])
        }
        (total, passed) => {
            let mut excerpt = vec![String::from("Malformed suite log, totals not found")];
            excerpt.extend(total.map(|(_, line)| line));
            excerpt.extend(passed.map(|(_, line)| line));
            (false, excerpt)
        }
    }
}

/// Decide an error-log suite: success iff the log is absent or empty.
pub fn evaluate_error_log(content: Option<&str>) -> (bool, Vec<String>) {
    match content {
        None => (true, Vec::new()),
        Some(content) if content.trim().is_empty() => (true, Vec::new()),
        Some(content) => (false, content.lines().map(str::to_string).collect()),
    }
}

/// The four figures preceding the last word of the throughput line.
pub fn throughput_figures<S: AsRef<str>>(lines: &[S]) -> Option<Vec<String>> {
    let line = lines
        .iter()
        .map(AsRef::as_ref)
        .find(|line| line.contains(THROUGHPUT_MARKER))?;
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() < 5 {
        return None;
    }
    Some(
        words[words.len() - 5..words.len() - 1]
            .iter()
            .map(|word| word.to_string())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec![String::from("TverdictOper")]
    }

    #[test]
    fn test_expected_failure_is_exempt() {
        let lines = [
            "foo",
            "Verdict statistics: 0 none, 5 pass (100.0%), 0 fail",
            "TverdictOper test",
            "Verdict statistics: 1 none, 5 pass (83.3%), 0 fail",
        ];
        let scan = scan_verdicts(&lines, &markers());
        assert!(scan.passed());
        assert_eq!(scan.verdicts, 2);
        assert_eq!(scan.expected_failures, 1);
    }

    #[test]
    fn test_unexpected_failure_is_reported() {
        let lines = [
            "TverdictOper test",
            "Verdict statistics: 5 pass (100.0%)",
            "Verdict statistics: 1 none, 5 pass (83.3%), 0 fail",
        ];
        let scan = scan_verdicts(&lines, &markers());
        assert!(!scan.passed());
        assert_eq!(scan.failing_lines, vec![lines[2].to_string()]);
    }

    #[test]
    fn test_first_line_has_no_predecessor() {
        let lines = ["Verdict stats: pass (50.0%)", "TverdictOper"];
        assert!(!scan_verdicts(&lines, &markers()).passed());
    }

    #[test]
    fn test_markers_are_configurable() {
        let lines = ["KnownIssue", "Verdict stats: pass (0.0%)"];
        assert!(!scan_verdicts(&lines, &markers()).passed());
        assert!(scan_verdicts(&lines, &[String::from("KnownIssue")]).passed());
    }

    #[test]
    fn test_count_log() {
        let good = [
            "Total number of test cases: 12",
            "  PASSED test cases: 12",
        ];
        assert!(evaluate_count_log(&good).0);
        let bad = ["Total number of test cases: 12", "PASSED test cases: 11"];
        assert!(!evaluate_count_log(&bad).0);
        let (passed, excerpt) = evaluate_count_log(&["Total number of test cases: 12"]);
        assert!(!passed);
        assert_eq!(excerpt[0], "Malformed suite log, totals not found");
    }

    #[test]
    fn test_error_log() {
        assert!(evaluate_error_log(None).0);
        assert!(evaluate_error_log(Some("\n")).0);
        let (passed, excerpt) = evaluate_error_log(Some("decode failed\n"));
        assert!(!passed);
        assert_eq!(excerpt, vec!["decode failed"]);
    }

    #[test]
    fn test_throughput_figures() {
        let lines = ["noise", "=>>>Entities/Time: 1000 998 2.5 997.0 ok"];
        assert_eq!(
            throughput_figures(&lines),
            Some(vec!["1000".into(), "998".into(), "2.5".into(), "997.0".into()])
        );
        assert_eq!(throughput_figures(&["=>>>Entities/Time: x"]), None);
    }
}
