use crate::core::error::{LqError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// One read: its length in bases and its mean quality.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub length: u64,
    pub quality: f64,
}

impl Measurement {
    pub fn new(length: u64, quality: f64) -> Self {
        Self { length, quality }
    }
}

pub fn lengths(measurements: &[Measurement]) -> Vec<f64> {
    measurements.iter().map(|m| m.length as f64).collect()
}

pub fn qualities(measurements: &[Measurement]) -> Vec<f64> {
    measurements.iter().map(|m| m.quality).collect()
}

/// Summed as `u128` so no table of `u64` lengths can overflow it.
pub fn total_bases(measurements: &[Measurement]) -> u128 {
    measurements.iter().map(|m| u128::from(m.length)).sum()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OutputFormat {
    Png,
    Pdf,
    Jpg,
    Svg,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Png,
        OutputFormat::Pdf,
        OutputFormat::Jpg,
        OutputFormat::Svg,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Svg => "svg",
        }
    }

    /// Parses every requested format, rejecting the whole list on the first
    /// unsupported entry. Duplicates collapse to one.
    pub fn parse_list<S: AsRef<str>>(requested: &[S]) -> Result<Vec<OutputFormat>> {
        if requested.is_empty() {
            return Err(LqError::InvalidArgument(
                "at least one output format is required".into(),
            ));
        }
        let mut out = Vec::with_capacity(requested.len());
        for r in requested {
            let f: OutputFormat = r.as_ref().parse()?;
            if !out.contains(&f) {
                out.push(f);
            }
        }
        Ok(out)
    }
}

impl FromStr for OutputFormat {
    type Err = LqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "pdf" => Ok(OutputFormat::Pdf),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            "svg" => Ok(OutputFormat::Svg),
            other => Err(LqError::InvalidArgument(format!(
                "unsupported output format '{}' (expected one of {})",
                other,
                OutputFormat::ALL.map(OutputFormat::extension).join(", ")
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FigureKind {
    Distribution,
    Merged,
}

impl FigureKind {
    pub fn suffix(self) -> &'static str {
        match self {
            FigureKind::Distribution => "ReadLengthAndQualityDistribution",
            FigureKind::Merged => "ReadLengthVsQualityMerged",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            FigureKind::Distribution => "ReadLengthAndQualityDistribution",
            FigureKind::Merged => "ReadLengthVsQuality",
        }
    }

    /// `{prefix}__{suffix}.{ext}`
    pub fn output_path(self, prefix: &str, format: OutputFormat) -> PathBuf {
        PathBuf::from(format!("{}__{}.{}", prefix, self.suffix(), format.extension()))
    }
}

/// Figure name taken from the last path component of the output prefix,
/// e.g. `out/sample1` -> `sample1`. Empty when the prefix ends in a separator.
pub fn name_from_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim();
    if trimmed.is_empty() || trimmed.ends_with('/') {
        return None;
    }
    Path::new(trimmed)
        .file_name()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(|s| s.to_string())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum SortOrder {
    #[default]
    Descending,
    Ascending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum Threshold {
    /// cumulative >= target
    #[default]
    AtLeast,
    /// cumulative > target
    Exceeds,
}

/// How Nx values are read off the cumulative base count.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub struct NxConvention {
    pub order: SortOrder,
    pub threshold: Threshold,
}

impl Threshold {
    pub fn reached(self, cumulative: f64, target: f64) -> bool {
        match self {
            Threshold::AtLeast => cumulative >= target,
            Threshold::Exceeds => cumulative > target,
        }
    }
}

/// Outlier trimming policy. Exactly one is applied per run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrimPolicy {
    /// Keep `mean - k*std <= length <= mean + k*std`.
    StdWindow { k: f64 },
    /// Keep `quantile(q) < length < quantile(1 - q)`.
    Quantile { q: f64 },
}

pub const DEFAULT_STD_MULTIPLIER: f64 = 3.0;

impl Default for TrimPolicy {
    fn default() -> Self {
        TrimPolicy::StdWindow {
            k: DEFAULT_STD_MULTIPLIER,
        }
    }
}

impl fmt::Display for TrimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrimPolicy::StdWindow { k } => write!(f, "mean ± {}·std", k),
            TrimPolicy::Quantile { q } => write!(f, "quantile ({}, {})", q, 1.0 - q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_formats() {
        let f = OutputFormat::parse_list(&["png", "PDF", "jpeg", "svg", "png"]).unwrap();
        assert_eq!(
            f,
            vec![
                OutputFormat::Png,
                OutputFormat::Pdf,
                OutputFormat::Jpg,
                OutputFormat::Svg
            ]
        );
    }

    #[test]
    fn bmp_is_invalid_argument() {
        let err = OutputFormat::parse_list(&["png", "bmp"]).unwrap_err();
        assert!(matches!(err, LqError::InvalidArgument(_)));
        assert!(err.to_string().contains("bmp"));
        assert!(err.to_string().contains("png, pdf, jpg, svg"));
    }

    #[test]
    fn empty_format_list_rejected() {
        let empty: [&str; 0] = [];
        assert!(OutputFormat::parse_list(&empty).is_err());
    }

    #[test]
    fn output_paths_follow_prefix() {
        let p = FigureKind::Distribution.output_path("out/s1", OutputFormat::Png);
        assert_eq!(
            p,
            PathBuf::from("out/s1__ReadLengthAndQualityDistribution.png")
        );
        let p = FigureKind::Merged.output_path("./plot_output", OutputFormat::Pdf);
        assert_eq!(p, PathBuf::from("./plot_output__ReadLengthVsQualityMerged.pdf"));
    }

    #[test]
    fn figure_name_from_prefix() {
        assert_eq!(name_from_prefix("out/sample1").as_deref(), Some("sample1"));
        assert_eq!(name_from_prefix("sample1").as_deref(), Some("sample1"));
        assert_eq!(name_from_prefix("out/"), None);
        assert_eq!(name_from_prefix(""), None);
    }
}
