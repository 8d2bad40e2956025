//! Reporting utilities: formatted terminal output for a fit.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{CurveFile, FitConfig, FitResult};
use crate::io::ingest::IngestedData;
use crate::math::StepOutcome;

const NOT_CONVERGED_WARNING: &str =
    "WARNING: the fit did not converge; coefficients are a best effort and not reliable.";

/// One-line coefficient report.
pub fn format_coefficients(fit: &FitResult) -> String {
    let c = &fit.coefficients;
    format!("Coefficients: a = {}, b = {}, c = {}", c.a, c.b, c.c)
}

/// Format the full run summary (inputs, solver diagnostics, result).
pub fn format_fit_summary(ingest: &IngestedData, fit: &FitResult, config: &FitConfig) -> String {
    let mut out = String::new();

    out.push_str("=== cirfit - CIR model calibration ===\n");
    out.push_str(&format!("Data: {}\n", config.data_path.display()));
    out.push_str(&format!(
        "Rows: used={} read={} skipped={}\n",
        ingest.rows_used,
        ingest.rows_read,
        ingest.row_errors.len()
    ));
    out.push_str(&format!(
        "Geometry: d={} m | dh={} m | r_eff={:.6} m\n",
        fit.geometry.horizontal,
        fit.geometry.vertical,
        fit.geometry.effective_distance()
    ));
    out.push_str(&format!(
        "Grid: n={} | t=[{}, {}] s\n",
        fit.grid.len(),
        fit.grid.start(),
        fit.grid.end()
    ));

    let accepted = fit
        .history
        .iter()
        .filter(|h| h.outcome == StepOutcome::Accepted)
        .count();
    let degenerate = fit
        .history
        .iter()
        .filter(|h| h.outcome == StepOutcome::Degenerate)
        .count();

    out.push_str("\nSolver:\n");
    out.push_str(&format!("- status : {}\n", fit.termination));
    out.push_str(&format!(
        "- steps  : {} ({} accepted, {} degenerate) | evaluations={}\n",
        fit.iterations, accepted, degenerate, fit.evaluations
    ));
    out.push_str(&format!(
        "- cost   : {:.6e} -> {:.6e} | RMSE={:.6}\n",
        fit.initial_cost,
        fit.cost,
        fit.rmse()
    ));

    out.push_str("\nInitial guess:\n");
    out.push_str(&format!("- {}\n", fit.initial));
    out.push_str("Fitted:\n");
    out.push_str(&format!("- {}\n", fit.coefficients));
    out.push_str("  (a only scales the model and cancels under peak normalization)\n");

    if !fit.is_converged() {
        out.push_str(&format!("\n{NOT_CONVERGED_WARNING}\n"));
    }

    out
}

/// Header for a replotted curve file: coefficients plus solver status.
pub fn format_curve_status(curve: &CurveFile) -> String {
    let mut out = format!("Coefficients: {}\n", curve.coefficients);
    out.push_str(&format!("Status: {}\n", curve.termination));
    if !curve.converged {
        out.push_str(NOT_CONVERGED_WARNING);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coefficients, EmpiricalSeries, Geometry, Termination, TimeGrid};

    fn fit(termination: Termination) -> FitResult {
        let grid = TimeGrid::linspace(0.1, 1.0, 3).unwrap();
        FitResult {
            initial: Coefficients::new(3.0, 1.4e-4, 4.0),
            coefficients: Coefficients::new(3.0, 0.5, 1.25),
            initial_cost: 1.0,
            cost: 0.02,
            termination,
            iterations: 4,
            evaluations: 20,
            geometry: Geometry::new(1.0, 0.15),
            grid,
            target: vec![0.5, 1.0, 0.5],
            fitted: vec![0.6, 1.0, 0.4],
            residuals: vec![0.1, 0.0, -0.1],
            history: Vec::new(),
        }
    }

    fn ingest() -> IngestedData {
        IngestedData {
            series: EmpiricalSeries::default(),
            row_errors: Vec::new(),
            rows_read: 3,
            rows_used: 3,
        }
    }

    fn config() -> FitConfig {
        use clap::Parser;
        let cli = crate::cli::Cli::parse_from(["cirfit", "fit", "--data", "data.csv"]);
        match cli.command {
            crate::cli::Command::Fit(args) => crate::app::fit_config_from_args(&args),
            _ => unreachable!(),
        }
    }

    #[test]
    fn coefficient_line_matches_expected_format() {
        let f = fit(Termination::Converged(crate::domain::ConvergenceReason::CostChange));
        assert_eq!(format_coefficients(&f), "Coefficients: a = 3, b = 0.5, c = 1.25");
    }

    #[test]
    fn unconverged_fit_is_flagged() {
        let f = fit(Termination::ConvergenceFailure { iterations: 4 });
        let txt = format_fit_summary(&ingest(), &f, &config());
        assert!(txt.contains("NOT converged"));
        assert!(txt.contains("WARNING"));
    }

    #[test]
    fn converged_fit_has_no_warning() {
        let f = fit(Termination::Converged(crate::domain::ConvergenceReason::Gradient));
        let txt = format_fit_summary(&ingest(), &f, &config());
        assert!(!txt.contains("WARNING"));
        assert!(txt.contains("Grid: n=3"));
    }

    #[test]
    fn unconverged_curve_file_is_flagged() {
        let f = fit(Termination::ConvergenceFailure { iterations: 1 });
        let txt = format_curve_status(&crate::io::curve_file(&f));
        assert!(txt.starts_with("Coefficients: a = 3, b = 0.5, c = 1.25\n"));
        assert!(txt.contains("Status: NOT converged"));
        assert!(txt.contains("WARNING"));

        let f = fit(Termination::Converged(crate::domain::ConvergenceReason::StepSize));
        let txt = format_curve_status(&crate::io::curve_file(&f));
        assert!(txt.contains("Status: converged (step-size tolerance)"));
        assert!(!txt.contains("WARNING"));
    }
}
