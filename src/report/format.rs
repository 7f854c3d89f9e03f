//! Plain-text tables for the terminal.
//!
//! Formatting lives here so the store and search code never print.

use crate::domain::CoefficientBounds;
use crate::io::LoadReport;
use crate::scan::ScanStore;

/// Per-entry fit summary: sample count, SM cross section and held-out error.
pub fn format_fit_summary(store: &ScanStore) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<28} {:<12} {:>7} {:>12} {:>10} {:>10}",
            "coefficients", "process", "points", "sm xs", "mean|err|%", "max|err|%"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<28} {:-<12} {:-<7} {:-<12} {:-<10} {:-<10}", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for key in store.keys() {
        let n = store.points(key).map_or(0, |p| p.nrows());
        let sm = store
            .sm_cross_section(&key.process)
            .map_or_else(|| "-".to_string(), |v| format!("{v:.4e}"));
        let (mean, max) = match store.fit_errs(key) {
            Some(errs) if !errs.is_empty() => {
                let abs: Vec<f64> = errs.iter().map(|e| e.abs()).collect();
                let mean = abs.iter().sum::<f64>() / abs.len() as f64;
                let max = abs.iter().copied().fold(0.0, f64::max);
                (format!("{mean:.3}"), format!("{max:.3}"))
            }
            _ => ("-".to_string(), "-".to_string()),
        };
        out.push_str(
            format!(
                "{:<28} {:<12} {:>7} {:>12} {:>10} {:>10}",
                truncate(&key.coefficients.joined(), 28),
                truncate(&key.process, 12),
                n,
                sm,
                mean,
                max
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Coefficient ranges found by the range search.
pub fn format_bounds(bounds: &[CoefficientBounds]) -> String {
    let mut out = String::new();
    for b in bounds {
        out.push_str(&format!("{:<16} [{:>12.6}, {:>12.6}]\n", b.coefficient, b.min, b.max));
    }
    out
}

/// Which files were merged and which were skipped.
pub fn format_load_report(report: &LoadReport) -> String {
    let mut out = format!(
        "merged {} file(s), skipped {}\n",
        report.loaded.len(),
        report.skipped.len()
    );
    for skipped in &report.skipped {
        out.push_str(&format!("- {}: {}\n", skipped.path.display(), skipped.reason));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitOptions, PointsInput};
    use crate::io::SkippedFile;
    use std::path::PathBuf;

    #[test]
    fn fit_summary_lists_every_entry() {
        let mut store = ScanStore::new();
        let points: Vec<f64> = (-2..=2).map(f64::from).collect();
        let xs: Vec<f64> = points.iter().map(|c| 2.0 * (1.0 + c * c)).collect();
        store.add(PointsInput::Column(&points), &xs, "ttZ", &["cuW"]).unwrap();
        store.add(PointsInput::Column(&points), &xs, "ttH", &["cuW"]).unwrap();
        store
            .fit(&FitOptions {
                max_points: Some(4),
                seed: Some(3),
            })
            .unwrap();

        let text = format_fit_summary(&store);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("cuW"));
        assert!(text.contains("ttZ") && text.contains("ttH"));
        assert!(!lines[2].ends_with('-'));
    }

    #[test]
    fn load_report_names_skipped_files() {
        let report = LoadReport {
            loaded: vec![PathBuf::from("a.json")],
            skipped: vec![SkippedFile {
                path: PathBuf::from("b.json"),
                reason: "truncated".to_string(),
            }],
        };
        let text = format_load_report(&report);
        assert!(text.starts_with("merged 1 file(s), skipped 1"));
        assert!(text.contains("b.json: truncated"));
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("cHq,cuW", 10), "cHq,cuW");
        assert_eq!(truncate("cHq,cuW,ctG", 6), "cHq,c.");
    }
}
