//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - fitted model curve: `-` line
//! - interpolated measurement: `o`

use crate::domain::{CurveFile, FitResult};

/// Render a plot for an in-memory fit result.
pub fn render_ascii_plot(fit: &FitResult, width: usize, height: usize) -> String {
    let t = fit.grid.as_slice();
    let fitted = pair_up(t, &fit.fitted);
    let measured = pair_up(t, &fit.target);
    render_plot(&fitted, &measured, fit.grid.start(), fit.grid.end(), width, height)
}

/// Render a plot from a saved curve JSON file.
pub fn render_ascii_plot_from_curve_file(curve: &CurveFile, width: usize, height: usize) -> String {
    let t = &curve.grid.t;
    let (t_min, t_max) = t_range(t).unwrap_or((0.0, 1.0));
    let fitted = pair_up(t, &curve.grid.fitted);
    let measured = pair_up(t, &curve.grid.measured);
    render_plot(&fitted, &measured, t_min, t_max, width, height)
}

fn pair_up(t: &[f64], y: &[f64]) -> Vec<(f64, f64)> {
    t.iter().copied().zip(y.iter().copied()).collect()
}

fn render_plot(
    fitted: &[(f64, f64)],
    measured: &[(f64, f64)],
    t_min: f64,
    t_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (y_min, y_max) = y_range(fitted, measured).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so measurement points overlay it.
    draw_curve(&mut grid, fitted, t_min, t_max, y_min, y_max);

    for &(t, y) in measured {
        if !(t.is_finite() && y.is_finite()) {
            continue;
        }
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        grid[yy][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: t=[{t_min:.3}, {t_max:.3}] s | y=[{y_min:.2}, {y_max:.2}] normalized\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out.push_str("Legend: '-' fitted model, 'o' interpolated data\n");

    out
}

fn t_range(t: &[f64]) -> Option<(f64, f64)> {
    let min_t = t.iter().copied().fold(f64::INFINITY, f64::min);
    let max_t = t.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min_t.is_finite() && max_t.is_finite() && max_t > min_t {
        Some((min_t, max_t))
    } else {
        None
    }
}

fn y_range(a: &[(f64, f64)], b: &[(f64, f64)]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for &(_, y) in a.iter().chain(b) {
        if y.is_finite() {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        if !(t.is_finite() && y.is_finite()) {
            prev = None;
            continue;
        }
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let fitted = [(0.0, 0.0), (1.0, 1.0)];
        let measured = [(0.0, 1.0), (1.0, 0.0)];

        let txt = render_plot(&fitted, &measured, 0.0, 1.0, 10, 5);
        let expected = concat!(
            "Plot: t=[0.000, 1.000] s | y=[-0.05, 1.05] normalized\n",
            "o       --\n",
            "      --  \n",
            "    --    \n",
            "  --      \n",
            "--       o\n",
            "Legend: '-' fitted model, 'o' interpolated data\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn plot_has_requested_dimensions() {
        let fitted: Vec<(f64, f64)> = (0..50).map(|i| (i as f64, (i as f64 * 0.2).sin())).collect();
        let txt = render_plot(&fitted, &fitted, 0.0, 49.0, 40, 12);
        let rows: Vec<&str> = txt.lines().collect();
        // header + 12 rows + legend
        assert_eq!(rows.len(), 14);
        assert!(rows[1..13].iter().all(|r| r.chars().count() == 40));
    }
}
