//! Command-line parsing for the CIR pulse-model fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Coefficients, Geometry, GridSpec, Tolerances};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cirfit", version, about = "Channel impulse response pulse-model fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the pulse model to a measured CIR, print the coefficients, and optionally plot/export.
    Fit(FitArgs),
    /// Plot a previously exported curve JSON.
    Plot(PlotArgs),
    /// Write a synthetic, peak-normalized CIR measurement generated from the model.
    Synth(SynthArgs),
}

/// Model coefficients `(a, b, c)`.
#[derive(Debug, Args, Clone)]
pub struct CoefficientArgs {
    /// Amplitude scale `a`.
    #[arg(short = 'a', long = "a", default_value_t = 3.0)]
    pub a: f64,

    /// Spread `b`.
    #[arg(short = 'b', long = "b", default_value_t = 1.4e-4)]
    pub b: f64,

    /// Propagation speed `c`.
    #[arg(short = 'c', long = "c", default_value_t = 4.0)]
    pub c: f64,
}

impl CoefficientArgs {
    pub fn coefficients(&self) -> Coefficients {
        Coefficients::new(self.a, self.b, self.c)
    }
}

/// Transmitter/receiver placement.
#[derive(Debug, Args, Clone)]
pub struct GeometryArgs {
    /// Horizontal transmitter–receiver separation.
    #[arg(short = 'd', long, default_value_t = 1.0)]
    pub distance: f64,

    /// Vertical offset between transmitter and receiver.
    #[arg(long, default_value_t = 0.15)]
    pub height_offset: f64,
}

impl GeometryArgs {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.distance, self.height_offset)
    }
}

/// Evaluation grid.
#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// First grid time (must be > 0).
    #[arg(long, default_value_t = 0.01)]
    pub t_start: f64,

    /// Last grid time.
    #[arg(long, default_value_t = 20.0)]
    pub t_end: f64,

    /// Number of grid points.
    #[arg(long, default_value_t = 500)]
    pub samples: usize,
}

impl GridArgs {
    pub fn grid_spec(&self) -> GridSpec {
        GridSpec {
            start: self.t_start,
            end: self.t_end,
            samples: self.samples,
        }
    }
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
#[command(allow_negative_numbers = true)]
pub struct FitArgs {
    /// Measured CIR as CSV.
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Name of the time column.
    #[arg(long, default_value = "Time")]
    pub time_column: String,

    /// Name of the peak-normalized amplitude column.
    #[arg(long, default_value = "normal")]
    pub amplitude_column: String,

    // Initial guess.
    #[command(flatten)]
    pub initial: CoefficientArgs,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    #[command(flatten)]
    pub grid: GridArgs,

    /// Maximum number of optimizer iterations.
    #[arg(long, default_value_t = 300)]
    pub max_iterations: usize,

    /// Relative cost-change tolerance.
    #[arg(long, default_value_t = 1e-8)]
    pub ftol: f64,

    /// Relative step-size tolerance.
    #[arg(long, default_value_t = 1e-8)]
    pub xtol: f64,

    /// Gradient tolerance.
    #[arg(long, default_value_t = 1e-8)]
    pub gtol: f64,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Render the fitted/measured overlay to a PNG chart.
    #[arg(long, value_name = "PNG")]
    pub chart: Option<PathBuf>,

    /// Export per-grid-point results to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export curve (coefficients + fitted grid) to JSON.
    #[arg(long = "export-curve")]
    pub export_curve: Option<PathBuf>,
}

impl FitArgs {
    pub fn tolerances(&self) -> Tolerances {
        Tolerances {
            ftol: self.ftol,
            xtol: self.xtol,
            gtol: self.gtol,
            max_iterations: self.max_iterations,
        }
    }
}

/// Options for plotting a saved curve.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Curve JSON file produced by `cirfit fit --export-curve`.
    #[arg(long, value_name = "JSON")]
    pub curve: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for synthetic data generation.
#[derive(Debug, Parser, Clone)]
#[command(allow_negative_numbers = true)]
pub struct SynthArgs {
    /// Output CSV path.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    // Coefficients of the generated pulse.
    #[command(flatten)]
    pub coefficients: CoefficientArgs,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    #[command(flatten)]
    pub grid: GridArgs,

    /// Gaussian noise standard deviation (relative to the unit peak).
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Name of the time column.
    #[arg(long, default_value = "Time")]
    pub time_column: String,

    /// Name of the amplitude column.
    #[arg(long, default_value = "normal")]
    pub amplitude_column: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_args(argv: &[&str]) -> FitArgs {
        match Cli::parse_from(argv).command {
            Command::Fit(args) => args,
            other => panic!("expected fit, got {other:?}"),
        }
    }

    #[test]
    fn fit_defaults_match_reference_setup() {
        let args = fit_args(&["cirfit", "fit", "--data", "cir.csv"]);
        assert_eq!(args.initial.coefficients(), Coefficients::new(3.0, 1.4e-4, 4.0));
        assert_eq!(args.geometry.distance, 1.0);
        assert_eq!(args.geometry.height_offset, 0.15);
        assert_eq!(args.grid.t_start, 0.01);
        assert_eq!(args.grid.t_end, 20.0);
        assert_eq!(args.grid.samples, 500);
        assert_eq!(args.tolerances(), Tolerances::default());
        assert_eq!(args.time_column, "Time");
        assert_eq!(args.amplitude_column, "normal");
    }

    #[test]
    fn negative_values_parse() {
        let args = fit_args(&["cirfit", "fit", "--data", "x.csv", "--height-offset", "-0.2", "-b", "-1e-3"]);
        assert_eq!(args.geometry.height_offset, -0.2);
        assert_eq!(args.initial.b, -1e-3);
    }

    #[test]
    fn synth_requires_output() {
        assert!(Cli::try_parse_from(["cirfit", "synth"]).is_err());
        let cli = Cli::try_parse_from(["cirfit", "synth", "--out", "s.csv", "--seed", "7"]).unwrap();
        match cli.command {
            Command::Synth(args) => {
                assert_eq!(args.seed, 7);
                assert_eq!(args.noise, 0.01);
            }
            other => panic!("expected synth, got {other:?}"),
        }
    }
}
