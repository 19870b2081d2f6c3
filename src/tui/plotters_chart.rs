//! Plotters-powered chart widget for Ratatui.
//!
//! Draws one projected [`ChartSpec`]: any mix of line/area/bar series on a
//! left and a right value axis, sharing one time axis.
//!
//! Both axes are drawn on a normalised `0..1` value coordinate. Each axis keeps
//! its own [`AxisFrame`] to map values in and tick labels back out, which is
//! also where inversion happens.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color as TuiColor, Style},
    widgets::Widget,
};

use crate::domain::{Axis, RenderType, Rgb, Unit};
use crate::io::coerce::timestamp_date;
use crate::report::format::format_axis_value;
use crate::surface::ChartSpec;

const DAY_SECS: f64 = 86_400.0;

/// Value range of one axis plus its display rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisFrame {
    pub lo: f64,
    pub hi: f64,
    pub inverted: bool,
    pub unit: Unit,
}

impl AxisFrame {
    pub fn for_axis(spec: &ChartSpec<'_>, axis: Axis) -> Self {
        let a = spec.axis(axis);
        let (lo, hi) = spec.value_bounds(axis).unwrap_or((0.0, 1.0));
        let pad = ((hi - lo).abs() * 0.05).max(if lo == hi { lo.abs() * 0.05 + 1.0 } else { 1e-12 });
        Self {
            lo: lo - pad,
            hi: hi + pad,
            inverted: a.inverted,
            unit: a.unit.unwrap_or(Unit::None),
        }
    }

    /// Value → `0..1` chart coordinate.
    pub fn to_unit(&self, v: f64) -> f64 {
        let u = (v - self.lo) / (self.hi - self.lo);
        if self.inverted { 1.0 - u } else { u }
    }

    /// `0..1` chart coordinate → value.
    pub fn from_unit(&self, u: f64) -> f64 {
        let u = if self.inverted { 1.0 - u } else { u };
        self.lo + u * (self.hi - self.lo)
    }

    pub fn label(&self, u: f64) -> String {
        format_axis_value(self.from_unit(u), self.unit)
    }
}

/// A render-only chart: the projection plus an optional crosshair timestamp.
pub struct LiquidityChart<'a> {
    pub spec: &'a ChartSpec<'a>,
    pub crosshair: Option<i64>,
}

impl Widget for LiquidityChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let min = if self.spec.compact { (8, 3) } else { (20, 8) };
        if area.width < min.0 || area.height < min.1 {
            buf.set_string(area.x, area.y, "Too small", Style::default().fg(TuiColor::Yellow));
            return;
        }
        let Some((t0, t1)) = self.spec.time_bounds() else {
            buf.set_string(area.x, area.y, "No data in range", Style::default().fg(TuiColor::DarkGray));
            return;
        };

        let (x0, x1) = if t1 > t0 {
            (t0 as f64, t1 as f64)
        } else {
            (t0 as f64 - DAY_SECS, t1 as f64 + DAY_SECS)
        };
        let left = AxisFrame::for_axis(self.spec, Axis::Left);
        let right = AxisFrame::for_axis(self.spec, Axis::Right);
        let spec = self.spec;
        let crosshair = self.crosshair;

        let widget = widget_fn(move |root| {
            let mut builder = ChartBuilder::on(&root);
            builder.margin(1);
            if !spec.compact {
                builder.set_label_area_size(LabelAreaPosition::Bottom, 2);
                if spec.left.visible {
                    builder.set_label_area_size(LabelAreaPosition::Left, 9);
                }
                if spec.right.visible {
                    builder.set_label_area_size(LabelAreaPosition::Right, 9);
                }
            }
            let mut chart = builder
                .build_cartesian_2d(x0..x1, 0.0..1.0)?
                .set_secondary_coord(x0..x1, 0.0..1.0);

            if !spec.compact {
                chart
                    .configure_mesh()
                    .disable_x_mesh()
                    .disable_y_mesh()
                    .x_labels(4)
                    .y_labels(if spec.left.visible { 5 } else { 0 })
                    .x_label_formatter(&|v| fmt_date(*v))
                    .y_label_formatter(&|v| left.label(*v))
                    .label_style(("sans-serif", 10).into_font().color(&WHITE))
                    .axis_style(&WHITE)
                    .draw()?;
                if spec.right.visible {
                    chart
                        .configure_secondary_axes()
                        .y_labels(5)
                        .y_label_formatter(&|v| right.label(*v))
                        .label_style(("sans-serif", 10).into_font().color(&WHITE))
                        .axis_style(&WHITE)
                        .draw()?;
                }
            }

            for s in &spec.series {
                let frame = match s.axis {
                    Axis::Left => left,
                    Axis::Right => right,
                };
                let color = rgb(s.color);
                let data = s.points.iter().map(move |p| (p.timestamp as f64, frame.to_unit(p.value)));

                match s.render {
                    RenderType::Line => {
                        chart.draw_series(LineSeries::new(data, &color))?;
                    }
                    RenderType::Area => {
                        chart.draw_series(AreaSeries::new(data, 0.0, color.mix(0.25)).border_style(&color))?;
                    }
                    RenderType::Bar => {
                        // Bars share the slot a single point occupies on the time axis.
                        let half = (x1 - x0) / (s.points.len().max(1) as f64) * 0.4;
                        chart.draw_series(
                            data.map(|(x, y)| Rectangle::new([(x - half, 0.0), (x + half, y)], color.filled())),
                        )?;
                    }
                }
            }

            if let Some(ts) = crosshair.map(|t| t as f64).filter(|t| (x0..=x1).contains(t)) {
                chart.draw_series(std::iter::once(PathElement::new(
                    vec![(ts, 0.0), (ts, 1.0)],
                    WHITE.mix(0.6),
                )))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}

fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

fn fmt_date(ts: f64) -> String {
    timestamp_date(ts.round() as i64)
        .map(|d| d.format("%y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;

    use ratatui::{Terminal, backend::TestBackend};

    use crate::domain::{Dataset, Point, RangeWindow, Series, SeriesCatalog, SeriesConfig};
    use crate::surface::{project_mini, project_single_overlay};

    fn dataset(values: &[f64]) -> Dataset {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Point::new(start + chrono::Duration::days(i as i64), v))
            .collect();
        let catalog = SeriesCatalog::new(vec![Series {
            config: SeriesConfig::new("SOFR", "SOFR", Unit::Percent, Rgb(0, 0, 0)),
            points,
            skipped: 0,
        }])
        .unwrap();
        Dataset::new(Arc::new(catalog), RangeWindow::All, start)
    }

    #[test]
    fn frame_maps_values_and_labels_back() {
        let data = dataset(&[4.0, 6.0]);
        let spec = project_single_overlay(&data, "SOFR").unwrap();
        let frame = AxisFrame::for_axis(&spec, Axis::Right);
        assert!((frame.lo - 3.9).abs() < 1e-9);
        assert!((frame.hi - 6.1).abs() < 1e-9);
        assert!((frame.from_unit(frame.to_unit(5.0)) - 5.0).abs() < 1e-9);
        assert_eq!(frame.label(frame.to_unit(5.0)), "5.00%");
    }

    #[test]
    fn inverted_frame_flips_the_coordinate() {
        let frame = AxisFrame { lo: 0.0, hi: 10.0, inverted: true, unit: Unit::None };
        assert!((frame.to_unit(10.0) - 0.0).abs() < 1e-12);
        assert!((frame.to_unit(0.0) - 1.0).abs() < 1e-12);
        assert!((frame.from_unit(0.25) - 7.5).abs() < 1e-12);
    }

    #[test]
    fn flat_series_gets_a_nonzero_span() {
        let data = dataset(&[5.0, 5.0]);
        let spec = project_single_overlay(&data, "SOFR").unwrap();
        let frame = AxisFrame::for_axis(&spec, Axis::Right);
        assert!(frame.hi > frame.lo);
        assert!((frame.to_unit(5.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn small_areas_get_a_hint_instead_of_a_chart() {
        let data = dataset(&[4.0, 4.5, 4.2, 5.1]);
        let spec = project_single_overlay(&data, "SOFR").unwrap();
        let tiny = Rect::new(0, 0, 10, 4);
        let mut buf = Buffer::empty(tiny);
        LiquidityChart { spec: &spec, crosshair: None }.render(tiny, &mut buf);
        assert!(buf.content().iter().any(|c| c.symbol() == "T"));
    }

    fn draw(spec: &ChartSpec<'_>, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|f| f.render_widget(LiquidityChart { spec, crosshair: None }, f.area()))
            .unwrap();
        terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn overlay_chart_renders_into_a_terminal() {
        let data = dataset(&[4.0, 4.5, 4.2, 5.1, 4.8]);
        let spec = project_single_overlay(&data, "SOFR").unwrap();
        let screen = draw(&spec, 80, 24);
        assert!(!screen.contains("Too small"));
        assert!(!screen.contains("No data in range"));
    }

    #[test]
    fn mini_chart_draws_its_series() {
        let data = dataset(&[4.0, 4.5, 4.2, 5.1, 4.8]);
        let spec = project_mini(&data, "SOFR", RenderType::Line).unwrap();
        let screen = draw(&spec, 30, 8);
        assert!(screen.chars().any(|c| !c.is_whitespace()));
    }
}
