//! Minimal SVG plotting surface: a [`Canvas`] owns the document, each
//! [`Axes`] maps data coordinates into one rectangular panel of it.

use crate::core::error::Result;
use std::fmt::Write;

const FONT: &str = "DejaVu Sans, Arial, Helvetica, sans-serif";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }
}

/// How tick values are printed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickFormat {
    Plain,
    /// value / 1e3 with a `k` suffix
    Kilo,
    /// value / 1e6 with an `Mb` suffix
    Mega,
    /// grid lines only
    Hidden,
}

impl TickFormat {
    pub fn label(self, v: f64) -> String {
        match self {
            TickFormat::Plain => fmt_tick(v),
            TickFormat::Kilo => format!("{}k", fmt_scaled(v / 1_000.0)),
            TickFormat::Mega => format!("{}Mb", fmt_scaled(v / 1_000_000.0)),
            TickFormat::Hidden => String::new(),
        }
    }
}

pub struct Canvas {
    out: String,
    width: f64,
    next_clip: usize,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        let mut out = String::with_capacity(64 * 1024);
        writeln!(
            out,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\" font-family=\"{}\">",
            width, height, width, height, FONT
        )?;
        writeln!(
            out,
            "<rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"#fff\"/>",
            width, height
        )?;
        Ok(Self {
            out,
            width,
            next_clip: 0,
        })
    }

    pub fn title(&mut self, text: &str, y: f64, font_size: f64) -> Result<()> {
        writeln!(
            self.out,
            "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"{}\" font-weight=\"bold\" fill=\"#222\" text-anchor=\"middle\">{}</text>",
            self.width / 2.0,
            y,
            font_size,
            escape_svg(text)
        )?;
        Ok(())
    }

    /// Opens a panel with fixed data ranges and draws its frame.
    pub fn axes(&mut self, frame: Rect, x_range: (f64, f64), y_range: (f64, f64)) -> Result<Axes> {
        let clip_id = format!("clip{}", self.next_clip);
        self.next_clip += 1;
        writeln!(
            self.out,
            "<defs><clipPath id=\"{}\"><rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\"/></clipPath></defs>",
            clip_id, frame.x, frame.y, frame.w, frame.h
        )?;
        writeln!(
            self.out,
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"#fff\" stroke=\"#ddd\"/>",
            frame.x, frame.y, frame.w, frame.h
        )?;
        Ok(Axes {
            frame,
            x_range: widen(x_range),
            y_range: widen(y_range),
            clip_id,
        })
    }

    pub fn finish(mut self) -> Result<String> {
        writeln!(self.out, "</svg>")?;
        Ok(self.out)
    }
}

/// Degenerate ranges get a unit span so coordinates stay finite.
fn widen((lo, hi): (f64, f64)) -> (f64, f64) {
    if (hi - lo).abs() < 1e-12 {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}

pub struct Axes {
    frame: Rect,
    x_range: (f64, f64),
    y_range: (f64, f64),
    clip_id: String,
}

impl Axes {
    pub fn x_range(&self) -> (f64, f64) {
        self.x_range
    }

    /// Strictly inside the visible x range.
    pub fn contains_x(&self, v: f64) -> bool {
        v.is_finite() && self.x_range.0 < v && v < self.x_range.1
    }

    fn px(&self, x: f64) -> f64 {
        let (lo, hi) = self.x_range;
        self.frame.x + (x - lo) / (hi - lo) * self.frame.w
    }

    fn py(&self, y: f64) -> f64 {
        let (lo, hi) = self.y_range;
        self.frame.bottom() - (y - lo) / (hi - lo) * self.frame.h
    }

    /// Vertical bars `(left, right, height)` rising from zero.
    pub fn vbars(&self, c: &mut Canvas, bars: &[(f64, f64, f64)], fill: &str) -> Result<()> {
        writeln!(c.out, "<g clip-path=\"url(#{})\" fill=\"{}\">", self.clip_id, fill)?;
        let y0 = self.py(0.0);
        for &(l, r, h) in bars {
            if h <= 0.0 {
                continue;
            }
            let x = self.px(l);
            let w = (self.px(r) - x).max(0.5);
            let top = self.py(h);
            writeln!(
                c.out,
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\"/>",
                x,
                top,
                w,
                (y0 - top).max(0.0)
            )?;
        }
        writeln!(c.out, "</g>")?;
        Ok(())
    }

    /// Horizontal bars `(bottom, top, length)` growing right from zero.
    pub fn hbars(&self, c: &mut Canvas, bars: &[(f64, f64, f64)], fill: &str) -> Result<()> {
        writeln!(c.out, "<g clip-path=\"url(#{})\" fill=\"{}\">", self.clip_id, fill)?;
        let x0 = self.px(0.0);
        for &(b, t, len) in bars {
            if len <= 0.0 {
                continue;
            }
            let y = self.py(t);
            let h = (self.py(b) - y).max(0.5);
            writeln!(
                c.out,
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\"/>",
                x0,
                y,
                (self.px(len) - x0).max(0.0),
                h
            )?;
        }
        writeln!(c.out, "</g>")?;
        Ok(())
    }

    /// One circular marker per point, emitted as a single path.
    pub fn scatter<I>(&self, c: &mut Canvas, points: I, radius: f64, fill: &str) -> Result<()>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        write!(
            c.out,
            "<path clip-path=\"url(#{})\" fill=\"{}\" fill-opacity=\"0.6\" d=\"",
            self.clip_id, fill
        )?;
        let d = radius * 2.0;
        for (x, y) in points {
            write!(
                c.out,
                "M{:.2} {:.2}m-{r} 0a{r} {r} 0 1 0 {d} 0a{r} {r} 0 1 0 -{d} 0",
                self.px(x),
                self.py(y),
                r = radius,
                d = d
            )?;
        }
        writeln!(c.out, "\"/>")?;
        Ok(())
    }

    pub fn vline(&self, c: &mut Canvas, x: f64, color: &str, width: f64, dashed: bool) -> Result<()> {
        let px = self.px(x);
        writeln!(
            c.out,
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{}\"{}/>",
            px,
            self.frame.y,
            px,
            self.frame.bottom(),
            color,
            width,
            if dashed { " stroke-dasharray=\"6 4\"" } else { "" }
        )?;
        Ok(())
    }

    /// Text anchored just above the top edge at data `x`, rotated upwards.
    pub fn annotate_top(
        &self,
        c: &mut Canvas,
        x: f64,
        text: &str,
        color: &str,
        rotation: f64,
    ) -> Result<()> {
        let px = self.px(x);
        let py = self.frame.y - 4.0;
        writeln!(
            c.out,
            "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"12\" fill=\"{}\" text-anchor=\"start\" transform=\"rotate({} {:.2} {:.2})\">{}</text>",
            px,
            py,
            color,
            -rotation,
            px,
            py,
            escape_svg(text)
        )?;
        Ok(())
    }

    pub fn x_ticks(&self, c: &mut Canvas, fmt: TickFormat, ticks: usize) -> Result<()> {
        let (lo, hi) = self.x_range;
        for v in tick_values(lo, hi, ticks) {
            let x = self.px(v);
            writeln!(
                c.out,
                "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"#eee\"/>",
                x,
                self.frame.y,
                x,
                self.frame.bottom()
            )?;
            if fmt == TickFormat::Hidden {
                continue;
            }
            writeln!(
                c.out,
                "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"10\" fill=\"#666\" text-anchor=\"middle\" dominant-baseline=\"hanging\">{}</text>",
                x,
                self.frame.bottom() + 4.0,
                fmt.label(v)
            )?;
        }
        Ok(())
    }

    pub fn y_ticks(&self, c: &mut Canvas, fmt: TickFormat, ticks: usize) -> Result<()> {
        let (lo, hi) = self.y_range;
        for v in tick_values(lo, hi, ticks) {
            let y = self.py(v);
            writeln!(
                c.out,
                "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"#eee\"/>",
                self.frame.x,
                y,
                self.frame.right(),
                y
            )?;
            if fmt == TickFormat::Hidden {
                continue;
            }
            writeln!(
                c.out,
                "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"10\" fill=\"#666\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>",
                self.frame.x - 4.0,
                y,
                fmt.label(v)
            )?;
        }
        Ok(())
    }

    pub fn x_label(&self, c: &mut Canvas, text: &str) -> Result<()> {
        writeln!(
            c.out,
            "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"13\" fill=\"#444\" text-anchor=\"middle\">{}</text>",
            self.frame.x + self.frame.w / 2.0,
            self.frame.bottom() + 34.0,
            escape_svg(text)
        )?;
        Ok(())
    }

    pub fn y_label(&self, c: &mut Canvas, text: &str) -> Result<()> {
        let x = self.frame.x - 52.0;
        let y = self.frame.y + self.frame.h / 2.0;
        writeln!(
            c.out,
            "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"13\" fill=\"#444\" text-anchor=\"middle\" transform=\"rotate(-90 {:.2} {:.2})\">{}</text>",
            x,
            y,
            x,
            y,
            escape_svg(text)
        )?;
        Ok(())
    }
}

/// Tick positions inside `[min, max]`, never below zero when the range
/// straddles it (the baseline padding is not labelled).
pub fn tick_values(min: f64, max: f64, ticks: usize) -> Vec<f64> {
    if ticks < 2 || (max - min).abs() < 1e-9 {
        return Vec::new();
    }
    let (start, step, count) = nice_ticks(min, max, ticks);
    let eps = step * 1e-6;
    (0..count)
        .map(|i| start + step * i as f64)
        .filter(|v| *v >= min - eps && *v <= max + eps)
        .filter(|v| !(min < 0.0 && max > 0.0 && *v < -eps))
        .map(|v| if v.abs() < eps { 0.0 } else { v })
        .collect()
}

pub fn nice_ticks(min: f64, max: f64, ticks: usize) -> (f64, f64, usize) {
    let range = (max - min).abs().max(1e-9);
    let rough = range / (ticks as f64 - 1.0);
    let mag = 10f64.powf(rough.abs().log10().floor());
    let norm = rough / mag;
    let step = if norm <= 1.0 {
        1.0
    } else if norm <= 2.0 {
        2.0
    } else if norm <= 5.0 {
        5.0
    } else {
        10.0
    } * mag;
    let start = (min / step).floor() * step;
    let end = (max / step).ceil() * step;
    let count = ((end - start) / step).round() as usize + 1;
    (start, step, count)
}

pub fn fmt_tick(v: f64) -> String {
    if (v - v.round()).abs() < 0.001 {
        format!("{}", v.round() as i64)
    } else if v.abs() < 10.0 {
        format!("{:.2}", v)
    } else {
        format!("{:.1}", v)
    }
}

/// Shortest decimal form up to six places: 0.002, 2.5, 20.
fn fmt_scaled(v: f64) -> String {
    let s = format!("{:.6}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

pub fn escape_svg(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
