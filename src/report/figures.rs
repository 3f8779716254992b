//! Layout of the two output figures.
//!
//! Which reference lines exist is decided once, from the reference stats and
//! the draw toggles ([`reference_lines`]). Whether a line is actually drawn
//! on a panel is then only a question of that panel's x range.

use crate::core::error::Result;
use crate::core::histogram::Histogram;
use crate::core::model::{FigureKind, Measurement};
use crate::core::stats::ReferenceStats;
use crate::report::svg::{Axes, Canvas, Rect, TickFormat};

const BAR_FILL: &str = "#7db8da";
const POINT_FILL: &str = "#1f77b4";
const BLACK: &str = "#000";
const RED: &str = "#d62728";

/// Fraction of the data span added on both sides of an x axis.
const X_MARGIN: f64 = 0.05;
/// Headroom above the tallest bar.
const Y_HEADROOM: f64 = 0.05;
/// Baseline padding below zero, as a fraction of the y range.
const Y_BASELINE_PAD: f64 = 0.02;
const ANNOTATION_ROTATION: f64 = 30.0;
const MARKER_RADIUS: f64 = 1.0;

/// Quality window shown by the scatter figure unless configured.
pub const DEFAULT_SCATTER_QUAL_RANGE: (f64, f64) = (5.0, 40.0);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DrawToggles {
    pub mean_length: bool,
    pub n50: bool,
    pub mean_quality: bool,
    pub mode_quality: bool,
}

impl Default for DrawToggles {
    fn default() -> Self {
        Self {
            mean_length: true,
            n50: true,
            mean_quality: true,
            mode_quality: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FigureOptions {
    /// Prefixed to both titles as `"{name}:"`.
    pub name: Option<String>,
    pub draw: DrawToggles,
    /// Visible quality window of the scatter figure.
    pub scatter_qual_range: (f64, f64),
}

impl Default for FigureOptions {
    fn default() -> Self {
        Self {
            name: None,
            draw: DrawToggles::default(),
            scatter_qual_range: DEFAULT_SCATTER_QUAL_RANGE,
        }
    }
}

/// Everything both figures are drawn from. Histograms are built from `kept`.
pub struct PlotData<'a> {
    pub kept: &'a [Measurement],
    pub length_hist: &'a Histogram,
    pub quality_hist: &'a Histogram,
    pub stats: &'a ReferenceStats,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RefLine {
    pub value: f64,
    pub color: &'static str,
    pub width: f64,
    pub label: String,
}

/// Reference lines for the length column and the quality column: a value
/// gets a line when it is present and its toggle is on.
pub fn reference_lines(stats: &ReferenceStats, draw: &DrawToggles) -> (Vec<RefLine>, Vec<RefLine>) {
    let mut length = Vec::new();
    if draw.mean_length && stats.mean_length.is_finite() {
        length.push(RefLine {
            value: stats.mean_length,
            color: BLACK,
            width: 0.8,
            label: format!("MeanLen={}", stats.mean_length.round() as i64),
        });
    }
    if let (true, Some(n50)) = (draw.n50, stats.n50) {
        length.push(RefLine {
            value: n50,
            color: RED,
            width: 1.0,
            label: format!("N50={}", n50.round() as i64),
        });
    }

    let mut quality = Vec::new();
    if let (true, Some(q)) = (draw.mean_quality, stats.mean_quality) {
        quality.push(RefLine {
            value: q,
            color: BLACK,
            width: 1.0,
            label: format!("MeanQ={:.2}", q),
        });
    }
    if let (true, Some(q)) = (draw.mode_quality, stats.mode_quality) {
        quality.push(RefLine {
            value: q,
            color: RED,
            width: 1.0,
            label: format!("ModeQ={:.2}", q),
        });
    }
    (length, quality)
}

pub fn figure_title(kind: FigureKind, name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => format!("{}:{}", n, kind.title()),
        None => kind.title().to_string(),
    }
}

fn padded_x_range(h: &Histogram) -> (f64, f64) {
    let (lo, hi) = h.range();
    let pad = (hi - lo) * X_MARGIN;
    (lo - pad, hi + pad)
}

/// `(-2% of top, top)` where top leaves headroom above `max`.
fn count_range(max: f64) -> (f64, f64) {
    let top = if max > 0.0 { max * (1.0 + Y_HEADROOM) } else { 1.0 };
    (-top * Y_BASELINE_PAD, top)
}

fn max_height(bars: &[(f64, f64, f64)]) -> f64 {
    bars.iter().map(|b| b.2).fold(0.0, f64::max)
}

/// Draws every line that falls inside the panel; annotates when asked.
/// Returns how many lines were drawn.
fn draw_ref_lines(c: &mut Canvas, ax: &Axes, lines: &[RefLine], annotate: bool) -> Result<usize> {
    let mut drawn = 0;
    for line in lines {
        if !ax.contains_x(line.value) {
            log::debug!("{} outside axis range {:?}, not drawn", line.label, ax.x_range());
            continue;
        }
        ax.vline(c, line.value, line.color, line.width, true)?;
        if annotate {
            ax.annotate_top(c, line.value, &line.label, line.color, ANNOTATION_ROTATION)?;
        }
        drawn += 1;
    }
    Ok(drawn)
}

/// 2×2 grid: columns are length and quality, rows are bases and reads.
pub fn distribution_figure(data: &PlotData<'_>, opts: &FigureOptions) -> Result<String> {
    let (width, height) = (1400.0, 900.0);
    let (left, right, top, bottom) = (90.0, 30.0, 120.0, 70.0);
    let (hgap, vgap) = (100.0, 24.0);
    let pw = (width - left - right - hgap) / 2.0;
    let ph = (height - top - bottom - vgap) / 2.0;
    let cell = |row: usize, col: usize| {
        Rect::new(
            left + col as f64 * (pw + hgap),
            top + row as f64 * (ph + vgap),
            pw,
            ph,
        )
    };

    let mut c = Canvas::new(width, height)?;
    c.title(
        &figure_title(FigureKind::Distribution, opts.name.as_deref()),
        44.0,
        26.0,
    )?;
    let (length_lines, quality_lines) = reference_lines(data.stats, &opts.draw);

    let columns = [
        (data.length_hist, TickFormat::Kilo, "ReadLength", &length_lines),
        (data.quality_hist, TickFormat::Plain, "ReadQuality", &quality_lines),
    ];
    for (col, (hist, x_fmt, x_label, lines)) in columns.into_iter().enumerate() {
        let x_range = padded_x_range(hist);
        let rows = [
            (hist.weighted_bars(), TickFormat::Mega, "NumberOfBases"),
            (hist.count_bars(), TickFormat::Kilo, "ReadCount"),
        ];
        for (row, (bars, y_fmt, y_label)) in rows.into_iter().enumerate() {
            let ax = c.axes(cell(row, col), x_range, count_range(max_height(&bars)))?;
            ax.y_ticks(&mut c, y_fmt, 5)?;
            // columns share x: only the bottom row is labelled
            if row == 1 {
                ax.x_ticks(&mut c, x_fmt, 6)?;
                ax.x_label(&mut c, x_label)?;
            } else {
                ax.x_ticks(&mut c, TickFormat::Hidden, 6)?;
            }
            ax.y_label(&mut c, y_label)?;
            ax.vbars(&mut c, &bars, BAR_FILL)?;
            draw_ref_lines(&mut c, &ax, lines, row == 0)?;
        }
    }
    c.finish()
}

/// Splits `total` into two spans with `ratio` between them and a gap of
/// `space` times their mean, the way grid layouts space subplots.
fn split(total: f64, ratio: (f64, f64), space: f64) -> (f64, f64, f64) {
    let sum = total / (1.0 + space / 2.0);
    let gap = total - sum;
    let a = sum * ratio.0 / (ratio.0 + ratio.1);
    (a, gap, sum - a)
}

/// Scatter of quality against length with marginal read-count histograms.
pub fn merged_figure(data: &PlotData<'_>, opts: &FigureOptions) -> Result<String> {
    let (width, height) = (800.0, 800.0);
    let (left, right, top, bottom) = (0.1 * width, 0.9 * width, 0.1 * height, 0.9 * height);
    let (main_w, wgap, side_w) = split(right - left, (4.0, 1.5), 0.05);
    let (side_h, hgap, main_h) = split(bottom - top, (1.5, 4.0), 0.05);

    let main_frame = Rect::new(left, top + side_h + hgap, main_w, main_h);
    let top_frame = Rect::new(left, top, main_w, side_h);
    let right_frame = Rect::new(left + main_w + wgap, top + side_h + hgap, side_w, main_h);

    let mut c = Canvas::new(width, height)?;
    c.title(
        &figure_title(FigureKind::Merged, opts.name.as_deref()),
        top - 40.0,
        20.0,
    )?;

    let x_range = padded_x_range(data.length_hist);
    let q_range = opts.scatter_qual_range;

    let main = c.axes(main_frame, x_range, q_range)?;
    main.x_ticks(&mut c, TickFormat::Kilo, 6)?;
    main.y_ticks(&mut c, TickFormat::Plain, 6)?;
    main.x_label(&mut c, "ReadLength")?;
    main.y_label(&mut c, "ReadQuality")?;
    main.scatter(
        &mut c,
        data.kept.iter().map(|m| (m.length as f64, m.quality)),
        MARKER_RADIUS,
        POINT_FILL,
    )?;

    let len_bars = data.length_hist.count_bars();
    let top_ax = c.axes(top_frame, x_range, count_range(max_height(&len_bars)))?;
    top_ax.x_ticks(&mut c, TickFormat::Hidden, 6)?;
    top_ax.y_ticks(&mut c, TickFormat::Kilo, 4)?;
    top_ax.y_label(&mut c, "ReadCount")?;
    top_ax.vbars(&mut c, &len_bars, BAR_FILL)?;

    let qual_bars = data.quality_hist.count_bars();
    let max_q = max_height(&qual_bars);
    let side_range = (0.0, if max_q > 0.0 { max_q * (1.0 + Y_HEADROOM) } else { 1.0 });
    let side_ax = c.axes(right_frame, side_range, q_range)?;
    side_ax.x_ticks(&mut c, TickFormat::Kilo, 3)?;
    side_ax.y_ticks(&mut c, TickFormat::Hidden, 6)?;
    side_ax.x_label(&mut c, "ReadCount")?;
    side_ax.hbars(&mut c, &qual_bars, BAR_FILL)?;

    c.finish()
}
