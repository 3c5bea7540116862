// rust/pipeline-core/src/storage/traits.rs

//! Storage abstraction traits used by the pipeline readers.

use std::path::Path;

use crate::error::Result;

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Size of the object in bytes.
    pub size: u64,
    /// Whether this object is a directory.
    pub is_dir: bool,
}

/// A handle for random-access reads from a stored object.
pub trait StorageReader: Send {
    /// Returns the total size of the object in bytes.
    fn size(&self) -> u64;

    /// Reads a range of bytes from the object.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the range is out of bounds.
    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>>;
}

/// The core storage backend trait.
///
/// # Object Safety
///
/// This trait is object-safe and can be used with `Arc<dyn StorageBackend>`,
/// which is how every pipeline stage holds it.
pub trait StorageBackend: Send + Sync {
    /// Checks if an object exists at the given path.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Retrieves metadata for an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or metadata cannot be read.
    fn metadata(&self, path: &Path) -> Result<ObjectMeta>;

    /// Opens an object for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or cannot be opened.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Lists the entries directly under `prefix`.
    ///
    /// Returns entry names (not full paths), sorted. A missing prefix
    /// yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if `prefix` is not a directory or the listing fails.
    fn list(&self, prefix: &Path) -> Result<Vec<String>>;
}
