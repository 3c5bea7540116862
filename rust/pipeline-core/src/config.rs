// rust/pipeline-core/src/config.rs

//! Configuration management for the input pipeline.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dataset::ReaderKind;
use crate::error::{PipelineError, Result};
use crate::pipeline::{DatasetDescriptor, PipelineSettings};

// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub dataset: DatasetConfig,
    pub performance: PerformanceConfig,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path that relative file patterns are resolved against.
    pub base_path: PathBuf,
    // Buffer size in bytes for buffered reads.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

/// Dataset description options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Name of the dataset, used in log and error messages.
    pub name: String,
    /// Glob pattern of the data files (e.g. "train/part-*.txt").
    pub data_files_pattern: String,
    /// Record reader: "text-line", "fixed:N" or "length-prefixed".
    pub reader: String,
    /// Minimum number of parsed examples to keep queued. Should be
    /// proportional to the RAM of the machine.
    pub min_queue_examples: usize,
    /// Size of the shuffle buffer. Required when reading with shuffle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle_size: Option<usize>,
    /// Optional seed for reproducible shuffling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

// Performance tuning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    // Number of parser threads and concurrent file readers. Defaults to
    // the number of CPUs plus one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,
    // Bytes read from a data file per storage call.
    pub read_chunk_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: "dataset".to_string(),
            data_files_pattern: String::new(),
            reader: "text-line".to_string(),
            min_queue_examples: 0,
            shuffle_size: None,
            seed: None,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            read_chunk_size: 64 * 1024, // 64 KB
        }
    }
}

impl DatasetConfig {
    /// Builds the immutable dataset descriptor for this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader string is not recognised.
    pub fn descriptor(&self) -> Result<DatasetDescriptor> {
        let reader: ReaderKind = self.reader.parse()?;
        let mut descriptor = DatasetDescriptor::new(&self.name, &self.data_files_pattern)
            .with_reader(reader)
            .with_min_queue_examples(self.min_queue_examples);
        if let Some(size) = self.shuffle_size {
            descriptor = descriptor.with_shuffle_size(size);
        }
        Ok(descriptor)
    }
}

impl PipelineConfig {
    /// Runtime settings derived from the performance and dataset sections.
    pub fn settings(&self) -> PipelineSettings {
        let mut settings = PipelineSettings::default();
        if let Some(threads) = self.performance.num_threads {
            settings.num_threads = threads;
        }
        settings.read_chunk_size = self.performance.read_chunk_size;
        settings.seed = self.dataset.seed;
        settings
    }
}

impl FromStr for PipelineConfig {
    type Err = PipelineError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| PipelineError::config_with_source("failed to parse TOML config", e))
    }
}

impl PipelineConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `DIP_` and use underscores
    // to separate nested fields. For example:
    // - `DIP_STORAGE_BASE_PATH` overrides `storage.base_path`
    // - `DIP_DATASET_DATA_FILES_PATTERN` overrides `dataset.data_files_pattern`
    // - `DIP_DATASET_SHUFFLE_SIZE` overrides `dataset.shuffle_size`
    // - `DIP_PERFORMANCE_NUM_THREADS` overrides `performance.num_threads`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Storage overrides
        if let Ok(val) = std::env::var("DIP_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("DIP_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("DIP_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("DIP_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }

        // Dataset overrides
        if let Ok(val) = std::env::var("DIP_DATASET_NAME") {
            self.dataset.name = val;
        }
        if let Ok(val) = std::env::var("DIP_DATASET_DATA_FILES_PATTERN") {
            self.dataset.data_files_pattern = val;
        }
        if let Ok(val) = std::env::var("DIP_DATASET_READER") {
            self.dataset.reader = val;
        }
        if let Ok(val) = std::env::var("DIP_DATASET_MIN_QUEUE_EXAMPLES") {
            if let Ok(v) = val.parse() {
                self.dataset.min_queue_examples = v;
            }
        }
        if let Ok(val) = std::env::var("DIP_DATASET_SHUFFLE_SIZE") {
            if let Ok(v) = val.parse() {
                self.dataset.shuffle_size = Some(v);
            }
        }
        if let Ok(val) = std::env::var("DIP_DATASET_SEED") {
            if let Ok(v) = val.parse() {
                self.dataset.seed = Some(v);
            }
        }

        // Performance overrides
        if let Ok(val) = std::env::var("DIP_PERFORMANCE_NUM_THREADS") {
            if let Ok(v) = val.parse() {
                self.performance.num_threads = Some(v);
            }
        }
        if let Ok(val) = std::env::var("DIP_PERFORMANCE_READ_CHUNK_SIZE") {
            if let Ok(v) = val.parse() {
                self.performance.read_chunk_size = v;
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        // Storage validation
        if self.storage.buffer_size == 0 {
            return Err(PipelineError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        // Dataset validation
        if self.dataset.data_files_pattern.is_empty() {
            return Err(PipelineError::config(
                "dataset.data_files_pattern must not be empty",
            ));
        }
        self.dataset.reader.parse::<ReaderKind>()?;
        if self.dataset.shuffle_size == Some(0) {
            return Err(PipelineError::config(
                "dataset.shuffle_size must be greater than 0",
            ));
        }

        // Performance validation
        if self.performance.num_threads == Some(0) {
            return Err(PipelineError::config(
                "performance.num_threads must be greater than 0",
            ));
        }
        if self.performance.read_chunk_size == 0 {
            return Err(PipelineError::config(
                "performance.read_chunk_size must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.dataset.data_files_pattern = "data/*.txt".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();

        assert_eq!(config.storage.base_path, PathBuf::from("."));
        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert!(config.storage.use_mmap);
        assert_eq!(config.storage.mmap_threshold, 1024 * 1024);

        assert_eq!(config.dataset.name, "dataset");
        assert!(config.dataset.data_files_pattern.is_empty());
        assert_eq!(config.dataset.reader, "text-line");
        assert_eq!(config.dataset.min_queue_examples, 0);
        assert!(config.dataset.shuffle_size.is_none());
        assert!(config.dataset.seed.is_none());

        assert!(config.performance.num_threads.is_none());
        assert_eq!(config.performance.read_chunk_size, 64 * 1024);
    }

    #[test]
    fn test_default_requires_pattern() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_from_str_partial() {
        let toml = r#"
            [dataset]
            data_files_pattern = "train-*.txt"
            shuffle_size = 1000
        "#;
        let config: PipelineConfig = toml.parse().unwrap();

        assert_eq!(config.dataset.data_files_pattern, "train-*.txt");
        assert_eq!(config.dataset.shuffle_size, Some(1000));
        // Other dataset fields should be defaults
        assert_eq!(config.dataset.reader, "text-line");
        // Other sections should be defaults
        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_full() {
        let toml = r#"
            [storage]
            base_path = "/data/training"
            buffer_size = 131072
            use_mmap = false
            mmap_threshold = 2097152

            [dataset]
            name = "mnist"
            data_files_pattern = "shards/*.bin"
            reader = "fixed:785"
            min_queue_examples = 512
            shuffle_size = 10000
            seed = 42

            [performance]
            num_threads = 8
            read_chunk_size = 1048576
        "#;

        let config: PipelineConfig = toml.parse().unwrap();

        assert_eq!(config.storage.base_path, PathBuf::from("/data/training"));
        assert_eq!(config.storage.buffer_size, 131072);
        assert!(!config.storage.use_mmap);
        assert_eq!(config.storage.mmap_threshold, 2097152);

        assert_eq!(config.dataset.name, "mnist");
        assert_eq!(config.dataset.data_files_pattern, "shards/*.bin");
        assert_eq!(config.dataset.reader, "fixed:785");
        assert_eq!(config.dataset.min_queue_examples, 512);
        assert_eq!(config.dataset.shuffle_size, Some(10000));
        assert_eq!(config.dataset.seed, Some(42));

        assert_eq!(config.performance.num_threads, Some(8));
        assert_eq!(config.performance.read_chunk_size, 1048576);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: std::result::Result<PipelineConfig, _> = "invalid = [".parse();
        assert!(matches!(result, Err(PipelineError::Config { .. })));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [dataset]
            name = "lines"
            data_files_pattern = "*.txt"
            "#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.dataset.name, "lines");
        assert_eq!(config.dataset.data_files_pattern, "*.txt");
    }

    #[test]
    fn test_from_file_missing() {
        let result = PipelineConfig::from_file("/nonexistent/pipeline.toml");
        assert!(matches!(result, Err(PipelineError::Storage { .. })));
    }

    #[test]
    fn test_from_file_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [dataset]
            data_files_pattern = "*.txt"
            reader = "parquet"
            "#
        )
        .unwrap();

        assert!(PipelineConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = valid_config();
        config.storage.buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.dataset.shuffle_size = Some(0);
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.performance.num_threads = Some(0);
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.performance.read_chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        // Variable names are unique to this test to avoid races with others.
        std::env::set_var("DIP_DATASET_DATA_FILES_PATTERN", "env/*.txt");
        std::env::set_var("DIP_DATASET_SHUFFLE_SIZE", "256");
        std::env::set_var("DIP_PERFORMANCE_NUM_THREADS", "not-a-number");

        let config = PipelineConfig::default().with_env_overrides();

        std::env::remove_var("DIP_DATASET_DATA_FILES_PATTERN");
        std::env::remove_var("DIP_DATASET_SHUFFLE_SIZE");
        std::env::remove_var("DIP_PERFORMANCE_NUM_THREADS");

        assert_eq!(config.dataset.data_files_pattern, "env/*.txt");
        assert_eq!(config.dataset.shuffle_size, Some(256));
        // Invalid values are ignored
        assert!(config.performance.num_threads.is_none());
    }

    #[test]
    fn test_descriptor_from_config() {
        let mut config = valid_config();
        config.dataset.reader = "length-prefixed".to_string();
        config.dataset.shuffle_size = Some(64);
        config.dataset.min_queue_examples = 10;

        let descriptor = config.dataset.descriptor().unwrap();
        assert_eq!(descriptor.name(), "dataset");
        assert_eq!(descriptor.data_files_pattern(), "data/*.txt");
        assert_eq!(descriptor.reader(), &ReaderKind::LengthPrefixed);
        assert_eq!(descriptor.min_queue_examples(), 10);
        assert_eq!(descriptor.shuffle_size(), Some(64));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = valid_config();
        config.performance.num_threads = Some(3);
        config.performance.read_chunk_size = 4096;
        config.dataset.seed = Some(7);

        let settings = config.settings();
        assert_eq!(settings.num_threads, 3);
        assert_eq!(settings.read_chunk_size, 4096);
        assert_eq!(settings.seed, Some(7));
    }

    #[test]
    fn test_toml_roundtrip() {
        let original = valid_config();
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: PipelineConfig = toml_str.parse().unwrap();
        assert_eq!(parsed.dataset.data_files_pattern, original.dataset.data_files_pattern);
        assert_eq!(parsed.storage.buffer_size, original.storage.buffer_size);
    }
}
