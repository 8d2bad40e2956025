//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads and interpolates the measurement
//! - runs the calibration
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, FitArgs, PlotArgs, SynthArgs};
use crate::data::{SynthConfig, generate_synthetic, write_series_csv};
use crate::domain::FitConfig;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `cirfit` binary.
pub fn run() -> Result<(), AppError> {
    // `.env` may carry RUST_LOG; load it before the logger reads the environment.
    dotenvy::dotenv().ok();
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).try_init();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Plot(args) => handle_plot(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    config.validate()?;

    let run = pipeline::run_fit(&config)?;

    println!("{}", crate::report::format_coefficients(&run.fit));
    println!(
        "{}",
        crate::report::format_fit_summary(&run.ingest, &run.fit, &config)
    );

    if config.plot {
        let plot = crate::plot::render_ascii_plot(&run.fit, config.plot_width, config.plot_height);
        println!("{plot}");
    }

    // Optional outputs.
    if let Some(path) = &config.chart {
        crate::plot::write_chart_png(path, &run.fit)?;
        println!("Chart written to {}", path.display());
    }
    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &run.fit)?;
    }
    if let Some(path) = &config.export_curve {
        crate::io::curve::write_curve_json(path, &run.fit)?;
    }

    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let curve = crate::io::curve::read_curve_json(&args.curve)?;

    print!("{}", crate::report::format_curve_status(&curve));
    let plot = crate::plot::render_ascii_plot_from_curve_file(&curve, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = SynthConfig {
        coefficients: args.coefficients.coefficients(),
        geometry: args.geometry.geometry(),
        grid: args.grid.grid_spec(),
        noise: args.noise,
        seed: args.seed,
    };
    let series = generate_synthetic(&config)?;
    write_series_csv(&args.out, &series, &args.time_column, &args.amplitude_column)?;

    log::info!("wrote {} synthetic samples to {}", series.len(), args.out.display());
    println!(
        "Wrote {} samples ({}) to {}",
        series.len(),
        config.coefficients,
        args.out.display()
    );
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        data_path: args.data.clone(),
        time_column: args.time_column.clone(),
        amplitude_column: args.amplitude_column.clone(),

        initial: args.initial.coefficients(),
        geometry: args.geometry.geometry(),
        grid: args.grid.grid_spec(),
        tolerances: args.tolerances(),

        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,

        chart: args.chart.clone(),
        export_results: args.export.clone(),
        export_curve: args.export_curve.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn config_carries_cli_values() {
        let cli = Cli::parse_from([
            "cirfit",
            "fit",
            "--data",
            "cir.csv",
            "--no-plot",
            "--max-iterations",
            "12",
            "--c",
            "3.5",
            "--export-curve",
            "curve.json",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert!(!config.plot);
        assert_eq!(config.tolerances.max_iterations, 12);
        assert_eq!(config.initial.c, 3.5);
        assert_eq!(config.grid.samples, 500);
        assert_eq!(config.export_curve.as_deref(), Some(std::path::Path::new("curve.json")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_distance_is_rejected_before_fitting() {
        let cli = Cli::parse_from(["cirfit", "fit", "--data", "cir.csv", "--distance", "0"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let err: AppError = fit_config_from_args(&args).validate().unwrap_err().into();
        assert_eq!(err.exit_code(), 2);
    }
}
