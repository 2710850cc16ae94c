use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::SweepError;

const CACHE_MAGIC: &[u8; 4] = b"HSWT";
const CACHE_VERSION: u16 = 1;
const CACHE_HEADER_LEN: usize = 4 + 2 + 8 + 8;

/// Row-major numeric table loaded from CSV or from its binary cache.
///
/// Fields that do not parse as numbers (dates, labels) are stored as NaN so
/// every row keeps the same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl NumericTable {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, TableError> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(TableError::Shape(format!(
                "{rows}x{cols} table needs {} values, got {}",
                rows.saturating_mul(cols),
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Value at `(row, col)`, or `None` outside the table.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    pub fn column(&self, col: usize) -> Result<Vec<f64>, TableError> {
        if col >= self.cols {
            return Err(TableError::Shape(format!(
                "column {col} out of range for table with {} columns",
                self.cols
            )));
        }
        Ok(self.data.iter().skip(col).step_by(self.cols).copied().collect())
    }

    /// Load a table from a CSV file using memory-mapped I/O.
    pub fn from_csv(path: &Path) -> Result<Self, TableError> {
        let file = std::fs::File::open(path).map_err(|e| TableError::Io(e.to_string()))?;
        let mmap =
            unsafe { memmap2::Mmap::map(&file) }.map_err(|e| TableError::Io(e.to_string()))?;
        Self::parse_csv_bytes(&mmap[..])
    }

    /// Parse CSV from raw bytes. The first line is a header and is skipped.
    pub fn parse_csv_bytes(data: &[u8]) -> Result<Self, TableError> {
        let len = data.len();
        let mut pos = match memchr::memchr(b'\n', data) {
            Some(nl) => nl + 1,
            None => return Self::new(0, 0, Vec::new()),
        };

        let mut cols = 0usize;
        let mut rows = 0usize;
        let mut values = Vec::with_capacity(len / 8);

        while pos < len {
            let line_end = memchr::memchr(b'\n', &data[pos..])
                .map(|i| pos + i)
                .unwrap_or(len);
            let mut line = &data[pos..line_end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }

            if !line.is_empty() {
                let before = values.len();
                Self::parse_row(line, &mut values);
                let width = values.len() - before;
                if rows == 0 {
                    cols = width;
                } else if width != cols {
                    return Err(TableError::Parse(format!(
                        "row {} has {width} columns, expected {cols}",
                        rows + 1
                    )));
                }
                rows += 1;
            }

            pos = line_end + 1;
        }

        Self::new(rows, cols, values)
    }

    fn parse_row(line: &[u8], out: &mut Vec<f64>) {
        let mut start = 0;
        loop {
            let end = memchr::memchr(b',', &line[start..])
                .map(|i| start + i)
                .unwrap_or(line.len());
            out.push(parse_field(&line[start..end]));
            if end == line.len() {
                break;
            }
            start = end + 1;
        }
    }

    /// Encode as the little-endian binary cache format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CACHE_HEADER_LEN + self.data.len() * 8);
        buf.extend_from_slice(CACHE_MAGIC);
        buf.extend_from_slice(&CACHE_VERSION.to_le_bytes());
        buf.extend_from_slice(&(self.rows as u64).to_le_bytes());
        buf.extend_from_slice(&(self.cols as u64).to_le_bytes());
        for v in &self.data {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TableError> {
        if bytes.len() < CACHE_HEADER_LEN || &bytes[..4] != CACHE_MAGIC {
            return Err(TableError::Cache("missing cache header".into()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != CACHE_VERSION {
            return Err(TableError::Cache(format!(
                "unsupported cache version {version}"
            )));
        }
        let rows = read_u64(&bytes[6..14]) as usize;
        let cols = read_u64(&bytes[14..22]) as usize;
        let body = &bytes[CACHE_HEADER_LEN..];
        if body.len() % 8 != 0 {
            return Err(TableError::Cache("truncated cache body".into()));
        }
        let data = body
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();
        Self::new(rows, cols, data).map_err(|e| TableError::Cache(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), TableError> {
        std::fs::write(path, self.to_bytes()).map_err(|e| TableError::Io(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, TableError> {
        let bytes = std::fs::read(path).map_err(|e| TableError::Io(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

/// Load `<dir>/<name>.dat` if present, otherwise parse `<dir>/<name>.csv`
/// and write the `.dat` cache next to it for the next run.
pub fn load_cached(dir: &Path, name: &str) -> Result<NumericTable, TableError> {
    let dat = cache_path(dir, name, "dat");
    if dat.exists() {
        tracing::info!(path = %dat.display(), "loading cached table");
        return NumericTable::load(&dat);
    }

    let csv = cache_path(dir, name, "csv");
    tracing::info!(
        path = %csv.display(),
        "no binary cache found, parsing csv"
    );
    let table = NumericTable::from_csv(&csv)?;
    tracing::info!(path = %dat.display(), rows = table.rows(), "saving binary cache");
    table.save(&dat)?;
    Ok(table)
}

fn cache_path(dir: &Path, name: &str, ext: &str) -> PathBuf {
    // Names such as "S&P 500" contain no extension; append rather than replace.
    dir.join(format!("{name}.{ext}"))
}

fn parse_field(bytes: &[u8]) -> f64 {
    fast_float::parse::<f64, _>(trim_field(bytes)).unwrap_or(f64::NAN)
}

/// Strip surrounding whitespace and one pair of double quotes.
fn trim_field(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.trim_ascii();
    let bytes = bytes.strip_prefix(b"\"").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\"").unwrap_or(bytes);
    bytes.trim_ascii()
}

fn read_u64(b: &[u8]) -> u64 {
    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("shape error: {0}")]
    Shape(String),
    #[error("cache error: {0}")]
    Cache(String),
}

impl From<TableError> for SweepError {
    fn from(e: TableError) -> Self {
        SweepError::InvalidInput(e.to_string())
    }
}
