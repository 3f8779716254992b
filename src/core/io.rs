use crate::core::error::{LqError, Result};
use crate::core::model::Measurement;
use flate2::read::MultiGzDecoder;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| LqError::io(path, e))?;
        // SAFETY: read-only file mapping.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| LqError::io(path, e))?;
        Ok(Self { mmap })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKind {
    Plain,
    Gzip,
}

pub fn detect_input_kind(path: &Path) -> Result<InputKind> {
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        if ext.eq_ignore_ascii_case("gz") {
            return Ok(InputKind::Gzip);
        }
    }
    let mut file = File::open(path).map_err(|e| LqError::io(path, e))?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic).map_err(|e| LqError::io(path, e))?;
    if n == 2 && magic == [0x1f, 0x8b] {
        Ok(InputKind::Gzip)
    } else {
        Ok(InputKind::Plain)
    }
}

/// Which tab-separated columns hold length and quality (0-based).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TableLayout {
    pub length_col: usize,
    pub quality_col: usize,
    pub header: bool,
}

impl Default for TableLayout {
    fn default() -> Self {
        // read_id, length, quality
        Self {
            length_col: 1,
            quality_col: 2,
            header: false,
        }
    }
}

pub fn read_table(path: &Path, layout: &TableLayout) -> Result<Vec<Measurement>> {
    if layout.length_col == layout.quality_col {
        return Err(LqError::InvalidArgument(format!(
            "length and quality columns must differ (both {})",
            layout.length_col
        )));
    }
    match detect_input_kind(path)? {
        InputKind::Plain => {
            let src = MmapSource::open(path)?;
            parse_table(src.bytes(), layout)
        }
        InputKind::Gzip => {
            let file = File::open(path).map_err(|e| LqError::io(path, e))?;
            let mut reader = BufReader::new(MultiGzDecoder::new(BufReader::new(file)));
            let mut out = Vec::new();
            let mut line = Vec::new();
            let mut line_no = 0usize;
            loop {
                line.clear();
                let n = reader
                    .read_until(b'\n', &mut line)
                    .map_err(|e| LqError::io(path, e))?;
                if n == 0 {
                    break;
                }
                line_no += 1;
                if let Some(m) = parse_line(&line, line_no, layout)? {
                    out.push(m);
                }
            }
            Ok(out)
        }
    }
}

/// Parses a whole in-memory table.
pub fn parse_table(bytes: &[u8], layout: &TableLayout) -> Result<Vec<Measurement>> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut line_no = 0usize;
    while start < bytes.len() {
        let end = memchr::memchr(b'\n', &bytes[start..])
            .map(|i| start + i)
            .unwrap_or(bytes.len());
        line_no += 1;
        if let Some(m) = parse_line(&bytes[start..end], line_no, layout)? {
            out.push(m);
        }
        start = end + 1;
    }
    Ok(out)
}

fn parse_line(raw: &[u8], line_no: usize, layout: &TableLayout) -> Result<Option<Measurement>> {
    if layout.header && line_no == 1 {
        return Ok(None);
    }
    let line = trim_eol(raw);
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }

    let mut length_field = None;
    let mut quality_field = None;
    let mut fields = 0usize;
    for (i, f) in memchr::memchr_iter(b'\t', line)
        .chain(std::iter::once(line.len()))
        .scan(0usize, |from, to| {
            let field = &line[*from..to];
            *from = to + 1;
            Some(field)
        })
        .enumerate()
    {
        fields = i + 1;
        if i == layout.length_col {
            length_field = Some(f);
        }
        if i == layout.quality_col {
            quality_field = Some(f);
        }
    }

    let (Some(lf), Some(qf)) = (length_field, quality_field) else {
        let missing = if length_field.is_none() {
            layout.length_col
        } else {
            layout.quality_col
        };
        return Err(LqError::InvalidArgument(format!(
            "column {} not present at line {} ({} columns)",
            missing, line_no, fields
        )));
    };

    let length = field_str(lf, line_no, layout.length_col)?
        .parse::<u64>()
        .map_err(|e| LqError::Parse {
            line: line_no,
            column: layout.length_col,
            msg: format!("read length: {}", e),
        })?;
    let quality = field_str(qf, line_no, layout.quality_col)?
        .parse::<f64>()
        .map_err(|e| LqError::Parse {
            line: line_no,
            column: layout.quality_col,
            msg: format!("read quality: {}", e),
        })?;
    if !quality.is_finite() || quality < 0.0 {
        return Err(LqError::Parse {
            line: line_no,
            column: layout.quality_col,
            msg: format!("read quality must be a finite non-negative number, got {}", quality),
        });
    }
    Ok(Some(Measurement::new(length, quality)))
}

fn field_str(field: &[u8], line: usize, column: usize) -> Result<&str> {
    std::str::from_utf8(field)
        .map(str::trim)
        .map_err(|_| LqError::Parse {
            line,
            column,
            msg: "field is not valid UTF-8".into(),
        })
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn parses_default_layout() {
        let data = b"r1\t1000\t10.5\nr2\t2000\t12\r\n\nr3\t1500\t11.25";
        let m = parse_table(data, &TableLayout::default()).unwrap();
        assert_eq!(
            m,
            vec![
                Measurement::new(1000, 10.5),
                Measurement::new(2000, 12.0),
                Measurement::new(1500, 11.25)
            ]
        );
    }

    #[test]
    fn custom_columns_and_header() {
        let layout = TableLayout {
            length_col: 0,
            quality_col: 3,
            header: true,
        };
        let data = b"len\ta\tb\tqual\n500\tx\ty\t7.5\n";
        let m = parse_table(data, &layout).unwrap();
        assert_eq!(m, vec![Measurement::new(500, 7.5)]);
    }

    #[test]
    fn missing_column_is_invalid_argument() {
        let err = parse_table(b"r1\t1000\n", &TableLayout::default()).unwrap_err();
        assert!(matches!(err, LqError::InvalidArgument(_)));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn bad_number_reports_line() {
        let err = parse_table(b"r1\t10\t1\nr2\tabc\t2\n", &TableLayout::default()).unwrap_err();
        match err {
            LqError::Parse { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(parse_table(b"r1\t10\t-3\n", &TableLayout::default()).is_err());
    }

    #[test]
    fn reads_plain_and_gzip_files() {
        let dir = tempfile::tempdir().unwrap();
        let body = "a\t100\t9.0\nb\t300\t14.0\n";

        let plain = dir.path().join("stats.tsv");
        std::fs::write(&plain, body).unwrap();
        let gz = dir.path().join("stats.tsv.gz");
        let mut enc = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        enc.write_all(body.as_bytes()).unwrap();
        enc.finish().unwrap();

        assert_eq!(detect_input_kind(&plain).unwrap(), InputKind::Plain);
        assert_eq!(detect_input_kind(&gz).unwrap(), InputKind::Gzip);
        let a = read_table(&plain, &TableLayout::default()).unwrap();
        let b = read_table(&gz, &TableLayout::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_table(Path::new("/nonexistent/stats.tsv"), &TableLayout::default())
            .unwrap_err();
        assert!(matches!(err, LqError::Io { .. }));
    }
}
