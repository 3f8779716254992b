//! Serialises a finished SVG figure into every requested format.
//!
//! Each file is encoded fully in memory, written next to its destination as
//! `<name>.tmp` and renamed into place, so a failed format never leaves a
//! partial image behind. Formats are independent: one failing does not stop
//! the rest.

use crate::core::error::{ExportFailure, LqError, Result};
use crate::core::model::{FigureKind, OutputFormat};
use resvg::tiny_skia;
use std::fs;
use std::path::{Path, PathBuf};

/// Raster output is drawn at this multiple of the SVG's pixel size.
const RASTER_SCALE: f32 = 2.0;
const JPEG_QUALITY: u8 = 92;

pub struct Exporter {
    pdf_opts: Option<svg2pdf::usvg::Options<'static>>,
    raster_opts: Option<resvg::usvg::Options<'static>>,
}

#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub written: Vec<PathBuf>,
    pub failures: Vec<ExportFailure>,
}

impl ExportOutcome {
    pub fn merge(&mut self, other: ExportOutcome) {
        self.written.extend(other.written);
        self.failures.extend(other.failures);
    }

    pub fn into_result(self) -> Result<Vec<PathBuf>> {
        if self.failures.is_empty() {
            Ok(self.written)
        } else {
            Err(LqError::Export {
                failures: self.failures,
            })
        }
    }
}

impl Exporter {
    /// Loads system fonts only for the backends the formats need.
    pub fn new(formats: &[OutputFormat]) -> Self {
        let pdf_opts = formats.contains(&OutputFormat::Pdf).then(|| {
            let mut opt = svg2pdf::usvg::Options::default();
            opt.fontdb_mut().load_system_fonts();
            opt
        });
        let raster_opts = formats
            .iter()
            .any(|f| matches!(f, OutputFormat::Png | OutputFormat::Jpg))
            .then(|| {
                let mut opt = resvg::usvg::Options::default();
                opt.fontdb_mut().load_system_fonts();
                opt
            });
        Self {
            pdf_opts,
            raster_opts,
        }
    }

    pub fn encode(&self, svg: &str, format: OutputFormat) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Svg => Ok(svg.as_bytes().to_vec()),
            OutputFormat::Pdf => svg_to_pdf(svg, self.pdf_options()?),
            OutputFormat::Png => {
                let pixmap = rasterize(svg, self.raster_options()?)?;
                pixmap
                    .encode_png()
                    .map_err(|e| LqError::Render(format!("png encoding failed: {e}")))
            }
            OutputFormat::Jpg => {
                let pixmap = rasterize(svg, self.raster_options()?)?;
                encode_jpeg(&pixmap)
            }
        }
    }

    fn pdf_options(&self) -> Result<&svg2pdf::usvg::Options<'static>> {
        self.pdf_opts
            .as_ref()
            .ok_or_else(|| LqError::Render("pdf backend was not initialised".into()))
    }

    fn raster_options(&self) -> Result<&resvg::usvg::Options<'static>> {
        self.raster_opts
            .as_ref()
            .ok_or_else(|| LqError::Render("raster backend was not initialised".into()))
    }

    /// Writes `svg` once per format under `{prefix}__{figure}.{ext}`.
    pub fn save_all(
        &self,
        kind: FigureKind,
        svg: &str,
        prefix: &str,
        formats: &[OutputFormat],
    ) -> ExportOutcome {
        let mut outcome = ExportOutcome::default();
        for &format in formats {
            let path = kind.output_path(prefix, format);
            let res = self
                .encode(svg, format)
                .and_then(|bytes| write_atomic(&path, &bytes));
            match res {
                Ok(()) => {
                    log::info!("wrote {}", path.display());
                    outcome.written.push(path);
                }
                Err(e) => {
                    log::warn!("failed to save {}: {}", path.display(), e);
                    outcome.failures.push(ExportFailure {
                        format,
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        outcome
    }
}

fn svg_to_pdf(svg: &str, opt: &svg2pdf::usvg::Options<'_>) -> Result<Vec<u8>> {
    let tree = svg2pdf::usvg::Tree::from_str(svg, opt)
        .map_err(|e| LqError::Render(format!("usvg parse failed: {e}")))?;
    svg2pdf::to_pdf(
        &tree,
        svg2pdf::ConversionOptions::default(),
        svg2pdf::PageOptions::default(),
    )
    .map_err(|e| LqError::Render(format!("svg2pdf conversion failed: {e}")))
}

fn rasterize(svg: &str, opt: &resvg::usvg::Options<'_>) -> Result<tiny_skia::Pixmap> {
    let tree = resvg::usvg::Tree::from_str(svg, opt)
        .map_err(|e| LqError::Render(format!("usvg parse failed: {e}")))?;
    let size = tree.size();
    let w = (size.width() * RASTER_SCALE).ceil() as u32;
    let h = (size.height() * RASTER_SCALE).ceil() as u32;
    let mut pixmap = tiny_skia::Pixmap::new(w, h)
        .ok_or_else(|| LqError::Render(format!("cannot allocate a {}x{} image", w, h)))?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(RASTER_SCALE, RASTER_SCALE),
        &mut pixmap.as_mut(),
    );
    Ok(pixmap)
}

/// The pixmap is fully opaque (white background), so its premultiplied RGBA
/// equals straight RGB and alpha can be dropped.
fn encode_jpeg(pixmap: &tiny_skia::Pixmap) -> Result<Vec<u8>> {
    let rgb: Vec<u8> = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(
            &rgb,
            pixmap.width(),
            pixmap.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| LqError::Render(format!("jpeg encoding failed: {e}")))?;
    Ok(out)
}

/// Writes through a sibling temp file and renames it into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let res = fs::write(&tmp_path, bytes)
        .map_err(|e| LqError::io(&tmp_path, e))
        .and_then(|_| fs::rename(&tmp_path, path).map_err(|e| LqError::io(path, e)));
    if res.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::svg::{Canvas, Rect};

    fn tiny_svg() -> String {
        let mut c = Canvas::new(120.0, 80.0).unwrap();
        let ax = c
            .axes(Rect::new(10.0, 10.0, 100.0, 60.0), (0.0, 2.0), (0.0, 2.0))
            .unwrap();
        ax.vbars(&mut c, &[(0.0, 1.0, 1.5)], "#7db8da").unwrap();
        c.finish().unwrap()
    }

    #[test]
    fn encodes_every_format() {
        let exporter = Exporter::new(&OutputFormat::ALL);
        let svg = tiny_svg();
        let png = exporter.encode(&svg, OutputFormat::Png).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let jpg = exporter.encode(&svg, OutputFormat::Jpg).unwrap();
        assert_eq!(&jpg[..2], &[0xff, 0xd8]);
        let pdf = exporter.encode(&svg, OutputFormat::Pdf).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        let raw = exporter.encode(&svg, OutputFormat::Svg).unwrap();
        assert_eq!(raw, svg.as_bytes());
    }

    #[test]
    fn save_all_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let svg = tiny_svg();
        let exporter = Exporter::new(&[OutputFormat::Svg]);
        // the pdf backend was never initialised, so pdf fails while svg succeeds
        let prefix = dir.path().join("s").to_string_lossy().into_owned();
        let outcome = exporter.save_all(
            FigureKind::Merged,
            &svg,
            &prefix,
            &[OutputFormat::Pdf, OutputFormat::Svg],
        );
        assert_eq!(outcome.written.len(), 1);
        assert!(outcome.written[0].exists());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].format, OutputFormat::Pdf);
        assert!(!outcome.failures[0].path.exists());
        assert!(matches!(
            outcome.into_result(),
            Err(LqError::Export { .. })
        ));
    }

    #[test]
    fn unwritable_destination_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing_dir").join("fig.svg");
        let err = write_atomic(&target, b"<svg/>").unwrap_err();
        assert!(matches!(err, LqError::Io { .. }));
        assert!(!dir.path().join("missing_dir").exists());
    }

    #[test]
    fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fig.svg");
        fs::write(&target, b"old").unwrap();
        write_atomic(&target, b"new").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert!(!dir.path().join("fig.svg.tmp").exists());
    }
}
