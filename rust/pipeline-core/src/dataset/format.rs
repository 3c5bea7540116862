// rust/pipeline-core/src/dataset/format.rs

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{PipelineError, Result};

/// Describes how to find record boundaries in a data file and how to strip
/// the framing from a raw record.
pub trait RecordFormat: Send + Sync {
    /// Find the end of the record that starts at `offset` in `data`.
    /// Returns the byte position after the record ends (exclusive end), or
    /// None if no complete record is available yet.
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize>;

    /// Strips the framing (delimiter, length prefix) from a complete raw record.
    fn payload<'a>(&self, raw: &'a [u8]) -> &'a [u8];

    /// Whether trailing bytes at end of file without a terminator form a record.
    fn allows_unterminated_tail(&self) -> bool {
        false
    }

    /// Name of this record format
    fn name(&self) -> &'static str;
}

/// Newline-delimited text records. The payload excludes the line terminator.
#[derive(Debug, Clone, Default)]
pub struct TextLineFormat;

impl TextLineFormat {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormat for TextLineFormat {
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        if offset >= data.len() {
            return None;
        }

        data[offset..]
            .iter()
            .position(|&byte| byte == b'\n')
            .map(|i| offset + i + 1) // Include the newline
    }

    fn payload<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        let line = raw.strip_suffix(b"\n").unwrap_or(raw);
        line.strip_suffix(b"\r").unwrap_or(line)
    }

    fn allows_unterminated_tail(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "text-line"
    }
}

/// Fixed-size binary records
#[derive(Debug, Clone)]
pub struct FixedSizeFormat {
    pub record_size: usize,
}

impl FixedSizeFormat {
    pub fn new(record_size: usize) -> Self {
        Self { record_size }
    }
}

impl RecordFormat for FixedSizeFormat {
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        let end = offset.checked_add(self.record_size)?;
        if end <= data.len() {
            Some(end)
        } else {
            None
        }
    }

    fn payload<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        raw
    }

    fn name(&self) -> &'static str {
        "fixed-size"
    }
}

/// Length-prefixed records (4-byte big-endian length + data)
#[derive(Debug, Clone, Default)]
pub struct LengthPrefixedFormat;

impl LengthPrefixedFormat {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormat for LengthPrefixedFormat {
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        if offset + 4 > data.len() {
            return None;
        }

        let length_bytes: [u8; 4] = data[offset..offset + 4].try_into().ok()?;
        let length = u32::from_be_bytes(length_bytes) as usize;

        let end = offset + 4 + length;
        if end <= data.len() {
            Some(end)
        } else {
            None
        }
    }

    fn payload<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        raw.get(4..).unwrap_or_default()
    }

    fn name(&self) -> &'static str {
        "length-prefixed"
    }
}

/// The record reader a dataset is built with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReaderKind {
    /// One record per line of text.
    #[default]
    TextLine,
    /// Binary records of a fixed number of bytes.
    FixedSize(usize),
    /// Binary records framed by a 4-byte big-endian length.
    LengthPrefixed,
}

impl ReaderKind {
    /// Creates the record format implementing this reader.
    pub fn format(&self) -> Arc<dyn RecordFormat> {
        match self {
            ReaderKind::TextLine => Arc::new(TextLineFormat::new()),
            ReaderKind::FixedSize(size) => Arc::new(FixedSizeFormat::new(*size)),
            ReaderKind::LengthPrefixed => Arc::new(LengthPrefixedFormat::new()),
        }
    }
}

impl fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderKind::TextLine => write!(f, "text-line"),
            ReaderKind::FixedSize(size) => write!(f, "fixed:{size}"),
            ReaderKind::LengthPrefixed => write!(f, "length-prefixed"),
        }
    }
}

/// Parses a reader string.
///
/// Supported readers:
/// - "text-line" (alias "newline") - one record per line
/// - "fixed:N" - fixed-size records of N bytes
/// - "length-prefixed" - 4-byte big-endian length prefix + data
impl FromStr for ReaderKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(size_str) = s.strip_prefix("fixed:") {
            let size: usize = size_str.parse().map_err(|_| {
                PipelineError::config(format!("invalid fixed record size: '{size_str}'"))
            })?;
            if size == 0 {
                return Err(PipelineError::config("fixed record size must be > 0"));
            }
            return Ok(ReaderKind::FixedSize(size));
        }

        match s {
            "text-line" | "newline" => Ok(ReaderKind::TextLine),
            "length-prefixed" => Ok(ReaderKind::LengthPrefixed),
            _ => Err(PipelineError::config(format!(
                "unknown record reader: '{s}'. Expected 'text-line', 'fixed:N', or 'length-prefixed'"
            ))),
        }
    }
}
