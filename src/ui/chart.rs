//! Chart widgets: a metric-over-time line chart for one run and
//! box-and-whisker plots of a rate per tier.

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line as TextLine, Span},
    widgets::{
        canvas::{Canvas, Line, Points, Rectangle},
        Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph,
    },
    Frame,
};

use super::theme::Theme;
use crate::data::format::{format_coins, format_duration};
use crate::data::stats::{BoxSummary, Metric};

const BOX_HALF_WIDTH: f64 = 0.3;
const CAP_HALF_WIDTH: f64 = 0.12;

fn chart_block<'a>(title: String, focused: bool, theme: &Theme) -> Block<'a> {
    let border_style = if focused {
        theme.title_style()
    } else {
        theme.border_style()
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style)
        .title_style(theme.title_style())
}

fn render_empty(frame: &mut Frame, area: Rect, block: Block) {
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let message = Paragraph::new("No data available")
        .style(Style::default().add_modifier(Modifier::DIM))
        .alignment(Alignment::Center);
    frame.render_widget(message, inner);
}

/// Format a metric value for axis labels
fn format_metric_value(metric: Metric, value: f64) -> String {
    if metric.is_coin_amount() {
        format_coins(value)
    } else {
        format!("{value:.2}")
    }
}

/// Pad a value range so flat series still get a visible axis
fn padded_bounds(min: f64, max: f64) -> [f64; 2] {
    let (min, max) = if min >= max {
        (min - 1.0, max + 1.0)
    } else {
        (min, max)
    };
    let pad = (max - min) * 0.05;
    [min - pad, max + pad]
}

/// Line chart of one metric over time spent for a single run
pub struct RunChart<'a> {
    points: &'a [(f64, f64)],
    metric: Metric,
    theme: &'a Theme,
}

impl<'a> RunChart<'a> {
    pub fn new(points: &'a [(f64, f64)], metric: Metric, theme: &'a Theme) -> Self {
        RunChart {
            points,
            metric,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let block = chart_block(
            format!(" {} over time ", self.metric.label()),
            focused,
            self.theme,
        );
        if self.points.is_empty() {
            render_empty(frame, area, block);
            return;
        }

        let (mut x_min, mut x_max) = (f64::MAX, f64::MIN);
        let (mut y_min, mut y_max) = (f64::MAX, f64::MIN);
        for &(x, y) in self.points {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
        if x_min >= x_max {
            x_max = x_min + 1.0;
        }
        let [y_lo, y_hi] = padded_bounds(y_min, y_max);

        let dataset = Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(self.theme.chart_color(0)))
            .data(self.points);

        let x_labels = vec![
            Span::raw(format_duration(x_min as i64)),
            Span::raw(format_duration(((x_min + x_max) / 2.0) as i64)),
            Span::raw(format_duration(x_max as i64)),
        ];
        let y_labels = vec![
            Span::raw(format_metric_value(self.metric, y_lo)),
            Span::raw(format_metric_value(self.metric, (y_lo + y_hi) / 2.0)),
            Span::raw(format_metric_value(self.metric, y_hi)),
        ];

        let chart = Chart::new(vec![dataset])
            .block(block)
            .x_axis(
                Axis::default()
                    .title(Span::styled(
                        "time spent",
                        Style::default().add_modifier(Modifier::DIM),
                    ))
                    .style(self.theme.normal_style())
                    .bounds([x_min, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .style(self.theme.normal_style())
                    .bounds([y_lo, y_hi])
                    .labels(y_labels),
            );

        frame.render_widget(chart, area);
    }
}

/// Box-and-whisker plot per tier for one rate metric
pub struct BoxPlotChart<'a> {
    /// `(tier, summary)` ascending by tier; `None` when a tier has no values
    boxes: &'a [(i64, Option<BoxSummary>)],
    metric: Metric,
    theme: &'a Theme,
}

impl<'a> BoxPlotChart<'a> {
    pub fn new(
        boxes: &'a [(i64, Option<BoxSummary>)],
        metric: Metric,
        theme: &'a Theme,
    ) -> Self {
        BoxPlotChart {
            boxes,
            metric,
            theme,
        }
    }

    /// Lowest and highest plotted value across all tiers
    fn value_range(&self) -> Option<(f64, f64)> {
        self.boxes
            .iter()
            .filter_map(|(_, b)| b.as_ref())
            .fold(None, |range, b| match range {
                None => Some((b.min, b.max)),
                Some((lo, hi)) => Some((f64::min(lo, b.min), f64::max(hi, b.max))),
            })
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let block = chart_block(
            format!(" {} by tier (latest entry per run) ", self.metric.label()),
            focused,
            self.theme,
        );
        let Some((lo, hi)) = self.value_range() else {
            render_empty(frame, area, block);
            return;
        };

        let [y_lo, y_hi] = padded_bounds(lo, hi);
        let label_y = y_lo;
        let x_max = self.boxes.len() as f64 + 1.0;
        let metric = self.metric;
        let theme = self.theme;

        let canvas = Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds([0.0, x_max])
            .y_bounds([y_lo, y_hi])
            .paint(move |ctx| {
                ctx.print(
                    0.0,
                    y_hi,
                    TextLine::styled(format_metric_value(metric, hi), theme.dimmed_title_style()),
                );
                ctx.print(
                    0.0,
                    y_lo,
                    TextLine::styled(format_metric_value(metric, lo), theme.dimmed_title_style()),
                );

                for (i, (tier, summary)) in self.boxes.iter().enumerate() {
                    let x = i as f64 + 1.0;
                    let color = theme.chart_color(i);
                    ctx.print(
                        x - CAP_HALF_WIDTH,
                        label_y,
                        TextLine::styled(format!("T{tier}"), theme.title_style()),
                    );
                    let Some(b) = summary else {
                        continue;
                    };

                    ctx.draw(&Rectangle {
                        x: x - BOX_HALF_WIDTH,
                        y: b.q1,
                        width: 2.0 * BOX_HALF_WIDTH,
                        height: (b.q3 - b.q1).max(f64::EPSILON),
                        color,
                    });
                    ctx.draw(&Line::new(
                        x - BOX_HALF_WIDTH,
                        b.median,
                        x + BOX_HALF_WIDTH,
                        b.median,
                        Color::White,
                    ));
                    ctx.draw(&Line::new(x, b.q3, x, b.upper_whisker, color));
                    ctx.draw(&Line::new(x, b.q1, x, b.lower_whisker, color));
                    for y in [b.lower_whisker, b.upper_whisker] {
                        ctx.draw(&Line::new(
                            x - CAP_HALF_WIDTH,
                            y,
                            x + CAP_HALF_WIDTH,
                            y,
                            color,
                        ));
                    }
                    let outliers: Vec<(f64, f64)> = b.outliers.iter().map(|&v| (x, v)).collect();
                    ctx.draw(&Points {
                        coords: &outliers,
                        color: Color::LightRed,
                    });
                }
            });

        frame.render_widget(canvas, area);
    }
}

/// Selector bar listing the metrics bound to the number keys
pub struct MetricSelector<'a> {
    metrics: &'a [Metric],
    selected: Metric,
    theme: &'a Theme,
}

impl<'a> MetricSelector<'a> {
    pub fn new(metrics: &'a [Metric], selected: Metric, theme: &'a Theme) -> Self {
        MetricSelector {
            metrics,
            selected,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let spans: Vec<Span> = self
            .metrics
            .iter()
            .enumerate()
            .flat_map(|(i, metric)| {
                let style = if *metric == self.selected {
                    self.theme.highlight_style()
                } else {
                    self.theme.normal_style()
                };
                vec![
                    Span::styled(format!("[{}] ", i + 1), Style::default().add_modifier(Modifier::DIM)),
                    Span::styled(format!("{}  ", metric.label()), style),
                ]
            })
            .collect();

        let paragraph = Paragraph::new(TextLine::from(spans)).style(self.theme.normal_style());
        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bounds_handles_flat_series() {
        let [lo, hi] = padded_bounds(5.0, 5.0);
        assert!(lo < 5.0 && hi > 5.0);

        let [lo, hi] = padded_bounds(0.0, 100.0);
        assert_eq!((lo, hi), (-5.0, 105.0));
    }

    #[test]
    fn test_axis_labels_use_coin_format() {
        assert_eq!(format_metric_value(Metric::CoinsPerHour, 2_500_000.0), "2.50M");
        assert_eq!(format_metric_value(Metric::CellsPerWave, 3.14159), "3.14");
    }

    #[test]
    fn test_box_plot_range_skips_empty_tiers() {
        let theme = Theme::default();
        let boxes = vec![
            (1, BoxSummary::from_values(&[2.0, 4.0])),
            (2, None),
            (3, BoxSummary::from_values(&[10.0])),
        ];
        let chart = BoxPlotChart::new(&boxes, Metric::CoinsPerHour, &theme);
        assert_eq!(chart.value_range(), Some((2.0, 10.0)));

        let empty: Vec<(i64, Option<BoxSummary>)> = vec![(1, None)];
        let chart = BoxPlotChart::new(&empty, Metric::CoinsPerHour, &theme);
        assert_eq!(chart.value_range(), None);
    }
}
