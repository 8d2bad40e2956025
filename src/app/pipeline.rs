//! Shared "fit pipeline" logic.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> grid -> interpolation -> calibration
//!
//! Front-ends can then focus on presentation.

use crate::domain::{FitConfig, FitResult};
use crate::error::AppError;
use crate::fit::{CalibrationInput, calibrate};
use crate::io::ingest::{IngestedData, load_series};

/// All computed outputs of a single `cirfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub fit: FitResult,
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    // 1) Load the measurement.
    let ingest = load_series(&config.data_path, &config.time_column, &config.amplitude_column)?;

    run_fit_with_data(config, ingest)
}

/// Execute the pipeline on already-ingested data.
pub fn run_fit_with_data(config: &FitConfig, ingest: IngestedData) -> Result<RunOutput, AppError> {
    // 2) Build the evaluation grid.
    let grid = config.grid.build()?;

    // 3) Interpolate and calibrate.
    let input = CalibrationInput {
        series: &ingest.series,
        grid: &grid,
        geometry: config.geometry,
        initial: config.initial,
        tolerances: config.tolerances,
    };
    let fit = calibrate(&input)?;

    Ok(RunOutput { ingest, fit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::fit_config_from_args;
    use crate::cli::{Cli, Command};
    use crate::io::ingest::read_series;
    use clap::Parser;

    fn config(extra: &[&str]) -> FitConfig {
        let mut argv = vec!["cirfit", "fit", "--data", "unused.csv"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Fit(args) => fit_config_from_args(&args),
            _ => unreachable!(),
        }
    }

    #[test]
    fn three_point_measurement_lowers_cost() {
        let csv = "Time,normal\n0.5,0.2\n1.0,1.0\n2.0,0.3\n";
        let ingest = read_series(csv.as_bytes(), "Time", "normal").unwrap();
        let run = run_fit_with_data(&config(&[]), ingest).unwrap();
        assert!(run.fit.cost <= run.fit.initial_cost);
        assert_eq!(run.fit.grid.len(), 500);
        assert_eq!(run.ingest.rows_used, 3);
    }

    #[test]
    fn single_row_is_insufficient() {
        let csv = "Time,normal\n1.0,1.0\n";
        let ingest = read_series(csv.as_bytes(), "Time", "normal").unwrap();
        let err = run_fit_with_data(&config(&[]), ingest).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = run_fit(&config(&[])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
