//! Plotters-powered PNG chart of a fit.
//!
//! Draws the fitted, peak-normalized model over the interpolated measurement
//! on the evaluation grid. All series and bounds are computed before drawing.

use std::path::Path;

use plotters::prelude::*;

use crate::domain::FitResult;
use crate::error::AppError;

pub const CHART_WIDTH: u32 = 1000;
pub const CHART_HEIGHT: u32 = 600;

/// A render-only chart description.
#[derive(Debug, Clone)]
pub struct FitChart {
    /// Fitted model on the grid.
    pub fitted: Vec<(f64, f64)>,
    /// Interpolated measurement on the grid.
    pub measured: Vec<(f64, f64)>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

impl FitChart {
    pub fn from_fit(fit: &FitResult) -> Self {
        let t = fit.grid.as_slice();
        let fitted: Vec<(f64, f64)> = t.iter().copied().zip(fit.fitted.iter().copied()).collect();
        let measured: Vec<(f64, f64)> = t.iter().copied().zip(fit.target.iter().copied()).collect();

        let (lo, hi) = fitted
            .iter()
            .chain(&measured)
            .map(|&(_, y)| y)
            .filter(|y| y.is_finite())
            .fold((0.0f64, 1.0f64), |(lo, hi), y| (lo.min(y), hi.max(y)));
        let pad = 0.05 * (hi - lo);

        Self {
            fitted,
            measured,
            x_bounds: [fit.grid.start(), fit.grid.end()],
            y_bounds: [lo - pad, hi + pad],
        }
    }

    /// Render to a PNG file.
    pub fn render_png(&self, path: &Path, width: u32, height: u32) -> Result<(), AppError> {
        let chart_err = |e: &dyn std::fmt::Display| {
            AppError::new(2, format!("Failed to render chart '{}': {e}", path.display()))
        };

        let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| chart_err(&e))?;

        let mut chart = ChartBuilder::on(&root)
            .margin(15)
            .caption("CIR pulse model fit", ("sans-serif", 22))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 45)
            .build_cartesian_2d(
                self.x_bounds[0]..self.x_bounds[1],
                self.y_bounds[0]..self.y_bounds[1],
            )
            .map_err(|e| chart_err(&e))?;

        chart
            .configure_mesh()
            .x_desc("Time (t) [s]")
            .y_desc("Normalized CIR")
            .light_line_style(BLACK.mix(0.05))
            .draw()
            .map_err(|e| chart_err(&e))?;

        chart
            .draw_series(LineSeries::new(self.fitted.iter().copied(), &BLUE))
            .map_err(|e| chart_err(&e))?
            .label("Fitted theoretical model")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

        chart
            .draw_series(LineSeries::new(self.measured.iter().copied(), &RED))
            .map_err(|e| chart_err(&e))?
            .label("Interpolated testbed data")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

        chart
            .configure_series_labels()
            .border_style(BLACK.mix(0.3))
            .background_style(WHITE.mix(0.9))
            .draw()
            .map_err(|e| chart_err(&e))?;

        root.present().map_err(|e| chart_err(&e))?;
        Ok(())
    }
}

/// Render the standard-size chart for a fit.
pub fn write_chart_png(path: &Path, fit: &FitResult) -> Result<(), AppError> {
    FitChart::from_fit(fit).render_png(path, CHART_WIDTH, CHART_HEIGHT)?;
    log::info!("chart written to {}", path.display());
    Ok(())
}
