// rust/pipeline-core/src/dataset/mod.rs

//! Pipeline stages for reading datasets.
//!
//! Each stage is a plain iterator over `Result` items, so stages compose in
//! the order the pipeline builder needs:
//!
//! ```text
//! list_files -> repeat_files -> InterleaveReader | SequentialReader
//!            -> ShardFilter -> ShuffleBuffer -> ParallelMap -> Batcher
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pipeline_core::dataset::{list_files, repeat_files, RecordSource, SequentialReader, ReaderKind};
//!
//! let files = list_files(storage.as_ref(), "train-*.txt")?;
//! let source = RecordSource::new(storage.clone(), ReaderKind::TextLine.format(), 64 * 1024);
//! for record in SequentialReader::new(source, repeat_files(files, Some(1))) {
//!     let record = record?;
//!     // Process record
//! }
//! ```

mod batch;
mod files;
mod format;
mod interleave;
mod map;
mod parser;
mod reader;
mod shard;
mod shuffle;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{Batch, Batcher};
pub use files::{list_files, repeat_files, FileSource};
pub use format::{
    FixedSizeFormat, LengthPrefixedFormat, ReaderKind, RecordFormat, TextLineFormat,
};
pub use interleave::InterleaveReader;
pub use map::ParallelMap;
pub use parser::{ColumnsParser, ExampleParser, RawParser};
pub use reader::{FileRecordReader, RecordSource, RecordStream, SequentialReader};
pub use shard::{ShardFilter, TaskSpec};
pub use shuffle::ShuffleBuffer;
