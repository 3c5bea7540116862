// rust/pipeline-core/src/storage/mod.rs

//! Storage abstraction for the input pipeline.
//!
//! Data files are read through the `StorageBackend` trait so the pipeline
//! stages never touch the filesystem directly. `LocalStorage` is the only
//! backend shipped here; tests substitute in-memory backends.
//!
//! # Example
//!
//! ```no_run
//! use pipeline_core::config::StorageConfig;
//! use pipeline_core::storage::{LocalStorage, StorageBackend};
//! use std::path::Path;
//!
//! let config = StorageConfig::default();
//! let storage = LocalStorage::new(&config).unwrap();
//!
//! let mut reader = storage.open_read(Path::new("train-00000.txt")).unwrap();
//! let header = reader.read_range(0, 16.min(reader.size() as usize)).unwrap();
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{ObjectMeta, StorageBackend, StorageReader};
