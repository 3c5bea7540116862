// rust/pipeline-core/src/dataset/parser.rs

//! Per-record parsing hooks.
//!
//! A dataset is defined by implementing [`ExampleParser`]: it turns one raw
//! record into the values handed to the model, usually an `(inputs, outputs)`
//! pair. Parsers run on the pipeline's worker threads, so they must be
//! `Send + Sync`.
//!
//! ```
//! use pipeline_core::dataset::ExampleParser;
//! use pipeline_core::{PipelineError, Result};
//!
//! struct PairParser;
//!
//! impl ExampleParser for PairParser {
//!     type Output = (i32, i32);
//!
//!     fn parse(&self, record: &[u8]) -> Result<Self::Output> {
//!         let line = std::str::from_utf8(record).map_err(|e| PipelineError::parse(e.to_string()))?;
//!         let mut fields = line.split_whitespace().map(str::parse::<i32>);
//!         match (fields.next(), fields.next()) {
//!             (Some(Ok(a)), Some(Ok(b))) => Ok((a, b + 1)),
//!             _ => Err(PipelineError::parse(format!("expected two integers: {line:?}"))),
//!         }
//!     }
//! }
//!
//! assert_eq!(PairParser.parse(b"3 4").unwrap(), (3, 5));
//! ```

use crate::error::{PipelineError, Result};

/// Maps one serialized record into the values returned to the model.
pub trait ExampleParser: Send + Sync + 'static {
    /// The parsed example, typically a fixed tuple such as `(inputs, outputs)`.
    type Output: Send + 'static;

    /// Parses a single record.
    ///
    /// Must be provided by every dataset; the default fails with
    /// `PipelineError::NotImplemented`.
    fn parse(&self, record: &[u8]) -> Result<Self::Output> {
        let _ = record;
        Err(PipelineError::not_implemented("ExampleParser::parse"))
    }
}

/// Returns records unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawParser;

impl ExampleParser for RawParser {
    type Output = Vec<u8>;

    fn parse(&self, record: &[u8]) -> Result<Self::Output> {
        Ok(record.to_vec())
    }
}

/// Parses a text record of numeric columns into `(inputs, outputs)`.
///
/// The first `input_columns` fields become the inputs and the remaining
/// fields the outputs. Fields are separated by whitespace unless a
/// delimiter is set.
#[derive(Debug, Clone)]
pub struct ColumnsParser {
    input_columns: usize,
    delimiter: Option<char>,
}

impl ColumnsParser {
    pub fn new(input_columns: usize) -> Self {
        Self {
            input_columns,
            delimiter: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    fn parse_fields(&self, line: &str) -> Result<Vec<f32>> {
        let parse_field = |field: &str| {
            field.trim().parse::<f32>().map_err(|e| {
                PipelineError::parse(format!("invalid numeric field {field:?} in {line:?}: {e}"))
            })
        };

        match self.delimiter {
            Some(delimiter) => line.split(delimiter).map(parse_field).collect(),
            None => line.split_whitespace().map(parse_field).collect(),
        }
    }
}

impl ExampleParser for ColumnsParser {
    type Output = (Vec<f32>, Vec<f32>);

    fn parse(&self, record: &[u8]) -> Result<Self::Output> {
        let line = std::str::from_utf8(record)
            .map_err(|e| PipelineError::parse(format!("record is not valid UTF-8: {e}")))?;

        let mut fields = self.parse_fields(line)?;
        if fields.len() < self.input_columns {
            return Err(PipelineError::parse(format!(
                "expected at least {} columns, found {} in {line:?}",
                self.input_columns,
                fields.len()
            )));
        }

        let outputs = fields.split_off(self.input_columns);
        Ok((fields, outputs))
    }
}
