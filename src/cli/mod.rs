//! Command-line parsing for the `xsec` cross-section scan tool.
//!
//! Argument structs stay separate from the store and search code; `app`
//! converts them into `FitOptions` / `RangeSearchOptions`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{FitOptions, RangeSearchOptions};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "xsec", version, about = "Cross-section scans over EFT Wilson coefficients")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge scan archives from parallel jobs, skipping unreadable ones.
    Merge(MergeArgs),
    /// Fit the scale model for every entry in an archive.
    Fit(FitArgs),
    /// Find coefficient ranges from a coarse scan and write the calculation grid.
    Grid(GridArgs),
    /// Write a fixed-interval grid around the SM point.
    Interval(IntervalArgs),
    /// Print predicted scales at a point.
    Evaluate(EvaluateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct MergeArgs {
    /// Archives to merge.
    #[arg(required = true, value_name = "ARCHIVE")]
    pub files: Vec<PathBuf>,

    /// Output archive.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Average duplicated points after merging.
    #[arg(long)]
    pub deduplicate: bool,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Archive to fit.
    pub archive: PathBuf,

    /// Where to write the fitted archive (defaults to overwriting the input).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Train on at most this many points per entry; the rest measure the fit error.
    #[arg(long)]
    pub max_points: Option<usize>,

    /// Seed for the train/test shuffle.
    #[arg(long, env = "XSEC_SEED")]
    pub seed: Option<u64>,
}

impl FitArgs {
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            max_points: self.max_points,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// Coarse scan archive with single-coefficient samples.
    pub coarse: PathBuf,

    /// Coefficients to span, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub coefficients: Vec<String>,

    /// Largest allowed ratio of NP to SM cross section.
    #[arg(long, default_value_t = 10.0)]
    pub scale: f64,

    /// Probe values per coefficient during the search.
    #[arg(long, default_value_t = 100)]
    pub interpolate: usize,

    /// Grid values per coefficient in the output.
    #[arg(long, default_value_t = 10)]
    pub calculate: usize,

    /// Relative growth per step while refining.
    #[arg(long, default_value_t = 0.2)]
    pub step: f64,

    /// Only consider these processes, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub constraints: Vec<String>,

    /// Draw this many uniform points inside the bounds instead of a regular grid.
    #[arg(long)]
    pub uniform: Option<usize>,

    /// Seed for `--uniform` draws.
    #[arg(long, env = "XSEC_SEED")]
    pub seed: Option<u64>,

    /// Also write the bounds as JSON.
    #[arg(long)]
    pub bounds_out: Option<PathBuf>,

    /// Grid CSV (stdout if omitted).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

impl GridArgs {
    pub fn range_options(&self) -> RangeSearchOptions {
        RangeSearchOptions {
            scale: self.scale,
            interpolate_numvalues: self.interpolate,
            calculate_numvalues: self.calculate,
            step: self.step,
            ..RangeSearchOptions::default()
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct IntervalArgs {
    /// Coefficients to span, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub coefficients: Vec<String>,

    /// Lowest coefficient value.
    #[arg(long, allow_negative_numbers = true)]
    pub low: f64,

    /// Highest coefficient value.
    #[arg(long, allow_negative_numbers = true)]
    pub high: f64,

    /// Values per coefficient.
    #[arg(long)]
    pub numvalues: usize,

    /// Grid CSV (stdout if omitted).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct EvaluateArgs {
    /// Archive holding the scan.
    pub archive: PathBuf,

    /// Coefficients of the entry, comma separated, in the order of `--point`.
    #[arg(long, value_delimiter = ',', required = true)]
    pub coefficients: Vec<String>,

    /// Process of the entry.
    #[arg(long)]
    pub process: String,

    /// Coefficient values, comma separated.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub point: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_args_split_comma_lists() {
        let cli = Cli::try_parse_from([
            "xsec",
            "grid",
            "coarse.json",
            "--coefficients",
            "cuW,cHq",
            "--scale",
            "5",
            "--constraints",
            "ttZ,ttH",
        ])
        .unwrap();
        let Command::Grid(args) = cli.command else {
            panic!("expected grid");
        };
        assert_eq!(args.coefficients, vec!["cuW", "cHq"]);
        assert_eq!(args.constraints, vec!["ttZ", "ttH"]);
        let opts = args.range_options();
        assert_eq!(opts.scale, 5.0);
        assert_eq!(opts.interpolate_numvalues, 100);
        assert_eq!(opts.min_value, 1e-11);
    }

    #[test]
    fn evaluate_accepts_negative_values() {
        let cli = Cli::try_parse_from([
            "xsec",
            "evaluate",
            "scan.json",
            "--coefficients",
            "cuW,cHq",
            "--process",
            "ttZ",
            "--point=-1.5,2",
        ])
        .unwrap();
        let Command::Evaluate(args) = cli.command else {
            panic!("expected evaluate");
        };
        assert_eq!(args.point, vec![-1.5, 2.0]);
    }

    #[test]
    fn merge_requires_inputs() {
        assert!(Cli::try_parse_from(["xsec", "merge", "-o", "out.json"]).is_err());
    }
}
