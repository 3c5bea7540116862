// rust/pipeline-core/src/lib.rs

//! Dataset Input Pipeline - Core Library
//!
//! This crate reads training examples from sharded data files: it lists the
//! files matching a glob pattern, reads their records (interleaving files
//! when shuffling), keeps the share belonging to this worker, shuffles,
//! parses records on a thread pool and groups the results into batches.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use storage::{LocalStorage, ObjectMeta, StorageBackend, StorageReader};

pub mod dataset;
pub use dataset::{Batch, ExampleParser, ReaderKind, RecordFormat, TaskSpec};

pub mod pipeline;
pub use pipeline::{BatchIterator, DatasetDescriptor, InputDataset, PipelineSettings, ReadOptions};
