//! ASCII/Unicode plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Each series gets a glyph from [`GLYPHS`] in projection order. Lines are
//! drawn point to point, areas are filled down to the bottom row with `.`, and
//! bars are vertical strokes. Left and right axes scale independently.

use crate::domain::{Axis, RenderType, Unit};
use crate::io::coerce::timestamp_date;
use crate::report::format::format_axis_value;
use crate::surface::{ChartSpec, SeriesSpec};

pub const GLYPHS: [char; 6] = ['*', '+', 'o', 'x', '#', '@'];
const FILL: char = '.';

/// Render a projected chart into a `width` x `height` grid plus a header and legend.
pub fn render_chart(spec: &ChartSpec<'_>, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let mut out = String::new();
    out.push_str(&spec.title);
    out.push('\n');

    let Some((t_min, t_max)) = spec.time_bounds() else {
        out.push_str("(no data in range)\n");
        return out;
    };

    out.push_str(&header_line(spec, t_min, t_max));
    out.push('\n');

    let mut grid = vec![vec![' '; width]; height];
    for (i, s) in spec.series.iter().enumerate() {
        let glyph = GLYPHS[i % GLYPHS.len()];
        let Some((y_min, y_max)) = spec.value_bounds(s.axis) else {
            continue;
        };
        let (y_min, y_max) = pad_range(y_min, y_max, 0.05);
        let inverted = spec.axis(s.axis).inverted;
        let cells: Vec<(usize, usize)> = s
            .points
            .iter()
            .map(|p| {
                (
                    map_x(p.timestamp, t_min, t_max, width),
                    map_y(p.value, y_min, y_max, height, inverted),
                )
            })
            .collect();
        draw_series(&mut grid, s, &cells, glyph);
    }

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    if !spec.compact {
        for (i, s) in spec.series.iter().enumerate() {
            out.push_str(&format!(
                "{} {} ({}, {})\n",
                GLYPHS[i % GLYPHS.len()],
                s.short_label,
                s.axis.display_name().to_lowercase(),
                s.render.display_name().to_lowercase(),
            ));
        }
    }
    out
}

fn header_line(spec: &ChartSpec<'_>, t_min: i64, t_max: i64) -> String {
    let date = |ts: i64| timestamp_date(ts).map(|d| d.to_string()).unwrap_or_default();
    let mut line = format!("Time: {} .. {}", date(t_min), date(t_max));
    for axis in [Axis::Left, Axis::Right] {
        let a = spec.axis(axis);
        if !a.visible {
            continue;
        }
        let Some((lo, hi)) = spec.value_bounds(axis) else {
            continue;
        };
        let unit = a.unit.unwrap_or(Unit::None);
        line.push_str(&format!(
            " | {}=[{}, {}]{}",
            axis.display_name().to_lowercase(),
            format_axis_value(lo, unit),
            format_axis_value(hi, unit),
            if a.inverted { " inverted" } else { "" },
        ));
    }
    line
}

fn draw_series(grid: &mut [Vec<char>], s: &SeriesSpec<'_>, cells: &[(usize, usize)], glyph: char) {
    let bottom = grid.len() - 1;
    match s.render {
        RenderType::Bar => {
            for &(x, y) in cells {
                for row in y..=bottom {
                    paint(grid, x, row, glyph);
                }
            }
        }
        RenderType::Line | RenderType::Area => {
            let mut path = Vec::new();
            match cells {
                [] => {}
                [only] => path.push(*only),
                _ => {
                    for w in cells.windows(2) {
                        path.extend(line_cells(w[0], w[1]));
                    }
                }
            }
            if s.render == RenderType::Area {
                for &(x, y) in &path {
                    for row in y + 1..=bottom {
                        paint(grid, x, row, FILL);
                    }
                }
            }
            for &(x, y) in &path {
                paint(grid, x, y, glyph);
            }
        }
    }
}

/// Write `ch` into a blank (or fill-only) cell. Earlier series win collisions.
fn paint(grid: &mut [Vec<char>], x: usize, y: usize, ch: char) {
    if let Some(cell) = grid.get_mut(y).and_then(|row| row.get_mut(x)) {
        if *cell == ' ' || (*cell == FILL && ch != FILL) {
            *cell = ch;
        }
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: i64, t_min: i64, t_max: i64, width: usize) -> usize {
    if t_max <= t_min {
        return 0;
    }
    let u = ((t - t_min) as f64 / (t_max - t_min) as f64).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize, inverted: bool) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    let u = if inverted { 1.0 - u } else { u };
    // max at row 0 unless inverted
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham), endpoints included.
fn line_cells(from: (usize, usize), to: (usize, usize)) -> Vec<(usize, usize)> {
    let (mut x0, mut y0) = (from.0 as isize, from.1 as isize);
    let (x1, y1) = (to.0 as isize, to.1 as isize);

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut out = Vec::new();
    loop {
        out.push((x0 as usize, y0 as usize));
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
    out
}
