// rust/pipeline-core/src/dataset/testing.rs

//! Shared fixtures for the dataset unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tempfile::TempDir;

use crate::config::StorageConfig;
use crate::error::{PipelineError, Result};
use crate::storage::{LocalStorage, ObjectMeta, StorageBackend, StorageReader};

/// Creates a `LocalStorage` rooted at a fresh temp dir containing `files`.
pub fn local_fixture(files: &[(&str, &[u8])]) -> (LocalStorage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
    }

    let config = StorageConfig {
        base_path: temp_dir.path().to_path_buf(),
        ..StorageConfig::default()
    };
    (LocalStorage::new(&config).unwrap(), temp_dir)
}

/// Text file content with one line per entry.
pub fn lines(prefix: &str, count: usize) -> Vec<u8> {
    (0..count)
        .map(|i| format!("{prefix}{i}\n"))
        .collect::<String>()
        .into_bytes()
}

/// Mock storage reader
struct MockReader {
    data: Vec<u8>,
    fail_reads: bool,
}

impl StorageReader for MockReader {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        if self.fail_reads {
            return Err(PipelineError::storage("mock", "injected read failure"));
        }

        let start = (start as usize).min(self.data.len());
        let end = start.saturating_add(length).min(self.data.len());
        Ok(self.data[start..end].to_vec())
    }
}

/// In-memory storage backend. Directories are implied by file paths.
pub struct MemoryStorage {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    failing: Mutex<BTreeSet<PathBuf>>,
    opens: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(BTreeSet::new()),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, data: Vec<u8>) {
        self.files.lock().unwrap().insert(path.into(), data);
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.files.lock().unwrap().remove(path.as_ref());
    }

    /// Makes every read of `path` fail.
    pub fn fail_reads(&self, path: impl Into<PathBuf>) {
        self.failing.lock().unwrap().insert(path.into());
    }

    /// Number of `open_read` calls so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files
            .lock()
            .unwrap()
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }
}

impl StorageBackend for MemoryStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        let is_file = self.files.lock().unwrap().contains_key(path);
        Ok(is_file || self.is_dir(path))
    }

    fn metadata(&self, path: &Path) -> Result<ObjectMeta> {
        if let Some(data) = self.files.lock().unwrap().get(path) {
            return Ok(ObjectMeta {
                size: data.len() as u64,
                is_dir: false,
            });
        }

        if self.is_dir(path) {
            return Ok(ObjectMeta {
                size: 0,
                is_dir: true,
            });
        }

        Err(PipelineError::storage(path, "not found"))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let files = self.files.lock().unwrap();
        let data = files
            .get(path)
            .ok_or_else(|| PipelineError::storage(path, "not found"))?
            .clone();

        Ok(Box::new(MockReader {
            data,
            fail_reads: self.failing.lock().unwrap().contains(path),
        }))
    }

    fn list(&self, prefix: &Path) -> Result<Vec<String>> {
        let files = self.files.lock().unwrap();
        let names: BTreeSet<String> = files
            .keys()
            .filter_map(|file| file.strip_prefix(prefix).ok())
            .filter_map(|rest| rest.components().next())
            .filter_map(|first| first.as_os_str().to_str().map(str::to_string))
            .collect();
        Ok(names.into_iter().collect())
    }
}
