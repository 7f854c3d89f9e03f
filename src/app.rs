//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and installs the log subscriber
//! - parses CLI arguments
//! - runs one command against the scan store
//! - prints summaries and writes archives or grids

use std::io::Write;
use std::path::Path;

use clap::Parser;
use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, EvaluateArgs, FitArgs, GridArgs, IntervalArgs, MergeArgs};
use crate::domain::{CoefficientTuple, PointsInput};
use crate::error::AppError;
use crate::io::export::{write_bounds_json, write_grid, write_grid_csv};
use crate::scan::ScanStore;
use crate::search::{find_bounds, grid_from_bounds, interval_points, sample_uniform};

/// Entry point for the `xsec` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Merge(args) => handle_merge(args),
        Command::Fit(args) => handle_fit(args),
        Command::Grid(args) => handle_grid(args),
        Command::Interval(args) => handle_interval(args),
        Command::Evaluate(args) => handle_evaluate(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_merge(args: MergeArgs) -> Result<(), AppError> {
    let (mut store, report) = ScanStore::open(&args.files);
    eprint!("{}", crate::report::format_load_report(&report));
    if report.loaded.is_empty() {
        return Err(AppError::new(2, "None of the input archives could be read."));
    }

    if args.deduplicate {
        let keys: Vec<_> = store.keys().cloned().collect();
        for key in &keys {
            store.deduplicate(key)?;
        }
    }
    store.dump(&args.output)?;
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let mut store = ScanStore::from_archive(&args.archive)?;
    store.fit(&args.fit_options())?;

    let output = args.output.as_deref().unwrap_or(&args.archive);
    store.dump(output)?;
    println!("{}", crate::report::format_fit_summary(&store));
    Ok(())
}

fn handle_grid(args: GridArgs) -> Result<(), AppError> {
    let mut coarse = ScanStore::from_archive(&args.coarse)?;
    if !args.constraints.is_empty() {
        coarse.retain_processes(&args.constraints);
    }

    let opts = args.range_options();
    let bounds = find_bounds(&args.coefficients, &mut coarse, &opts)?;
    eprint!("{}", crate::report::format_bounds(&bounds));
    if let Some(path) = &args.bounds_out {
        write_bounds_json(path, &bounds)?;
    }

    let points = match args.uniform {
        Some(count) => {
            let mut rng = match args.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            sample_uniform(&bounds, count, &mut rng)?
        }
        None => grid_from_bounds(&bounds, opts.calculate_numvalues),
    };
    write_points(args.output.as_deref(), &args.coefficients, &points)
}

fn handle_interval(args: IntervalArgs) -> Result<(), AppError> {
    let points = interval_points(args.coefficients.len(), args.low, args.high, args.numvalues)?;
    write_points(args.output.as_deref(), &args.coefficients, &points)
}

fn handle_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    if args.point.len() != args.coefficients.len() {
        return Err(AppError::new(
            2,
            format!(
                "--point has {} values but {} coefficients were given.",
                args.point.len(),
                args.coefficients.len()
            ),
        ));
    }
    let (tuple, permutation) = CoefficientTuple::canonicalize(&args.coefficients)?;
    let point: Vec<f64> = permutation.iter().map(|&i| args.point[i]).collect();

    let mut store = ScanStore::from_archive(&args.archive)?;
    let scales = store.evaluate(tuple, PointsInput::Row(&point), &args.process)?;
    for scale in scales.iter() {
        println!("{scale}");
    }
    Ok(())
}

fn write_points(output: Option<&Path>, coefficients: &[String], points: &DMatrix<f64>) -> Result<(), AppError> {
    match output {
        Some(path) => write_grid_csv(path, coefficients, points),
        None => {
            let mut stdout = std::io::stdout().lock();
            write_grid(&mut stdout, coefficients, points)
                .and_then(|()| stdout.flush())
                .map_err(|e| AppError::new(2, format!("Failed to write grid: {e}")))
        }
    }
}
