// rust/pipeline-core/src/pipeline.rs

//! Input pipeline construction.
//!
//! `InputDataset` ties a dataset description, a record parser and a storage
//! backend together and builds the reading pipeline on demand.
//!
//! # Example
//!
//! ```no_run
//! use pipeline_core::config::PipelineConfig;
//! use pipeline_core::dataset::{ColumnsParser, TaskSpec};
//! use pipeline_core::{InputDataset, ReadOptions};
//!
//! let config = PipelineConfig::from_file("pipeline.toml").unwrap().with_env_overrides();
//! let dataset = InputDataset::from_config(&config, ColumnsParser::new(2)).unwrap();
//!
//! println!("{} has {} records", dataset.descriptor().name(), dataset.size().unwrap());
//!
//! let options = ReadOptions::default()
//!     .with_epochs(10)
//!     .shuffled()
//!     .with_task_spec(TaskSpec::new(4, 0));
//! let mut batches = dataset.read(32, options).unwrap();
//! while let Some(batch) = batches.next_batch().unwrap() {
//!     let (inputs, outputs) = batch.unzip();
//!     // Feed the model
//! }
//! ```

use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

use crate::config::PipelineConfig;
use crate::dataset::{
    list_files, repeat_files, Batch, Batcher, ExampleParser, InterleaveReader, ParallelMap,
    ReaderKind, RecordSource, RecordStream, SequentialReader, ShardFilter, ShuffleBuffer,
    TaskSpec,
};
use crate::error::{PipelineError, Result};
use crate::storage::{LocalStorage, StorageBackend};

/// Number of CPUs available to this process.
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Parsed examples kept in flight: `batch_size` per CPU plus the dataset's
/// queue minimum.
pub fn output_buffer_size(batch_size: usize, cpus: usize, min_queue_examples: usize) -> Result<usize> {
    batch_size
        .checked_mul(cpus)
        .and_then(|size| size.checked_add(min_queue_examples))
        .ok_or_else(|| {
            PipelineError::config(format!(
                "parse buffer of {batch_size} x {cpus} cpus + {min_queue_examples} examples overflows"
            ))
        })
}

/// Immutable description of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    name: String,
    data_files_pattern: String,
    reader: ReaderKind,
    min_queue_examples: usize,
    shuffle_size: Option<usize>,
}

impl DatasetDescriptor {
    /// Creates a text-line dataset with no queue minimum and no shuffle buffer.
    pub fn new(name: impl Into<String>, data_files_pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_files_pattern: data_files_pattern.into(),
            reader: ReaderKind::TextLine,
            min_queue_examples: 0,
            shuffle_size: None,
        }
    }

    /// Sets the record reader.
    pub fn with_reader(mut self, reader: ReaderKind) -> Self {
        self.reader = reader;
        self
    }

    /// Sets the minimum number of parsed examples to keep queued.
    pub fn with_min_queue_examples(mut self, min_queue_examples: usize) -> Self {
        self.min_queue_examples = min_queue_examples;
        self
    }

    /// Sets the shuffle buffer size.
    pub fn with_shuffle_size(mut self, shuffle_size: usize) -> Self {
        self.shuffle_size = Some(shuffle_size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_files_pattern(&self) -> &str {
        &self.data_files_pattern
    }

    pub fn reader(&self) -> &ReaderKind {
        &self.reader
    }

    pub fn min_queue_examples(&self) -> usize {
        self.min_queue_examples
    }

    pub fn shuffle_size(&self) -> Option<usize> {
        self.shuffle_size
    }
}

/// Runtime knobs that don't describe the data itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Parser threads, and files read concurrently when shuffling.
    pub num_threads: usize,
    /// Bytes read from a data file per storage call.
    pub read_chunk_size: usize,
    /// Seed for the shuffle buffer; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            num_threads: cpu_count() + 1,
            read_chunk_size: 64 * 1024,
            seed: None,
        }
    }
}

/// Options for a single `InputDataset::read` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Passes over the data; `None` repeats forever.
    pub num_epochs: Option<u32>,
    /// Interleave files and shuffle records.
    pub shuffle: bool,
    /// Distributed worker identity, if any.
    pub task_spec: Option<TaskSpec>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            num_epochs: Some(1),
            shuffle: false,
            task_spec: None,
        }
    }
}

impl ReadOptions {
    pub fn with_epochs(mut self, num_epochs: u32) -> Self {
        self.num_epochs = Some(num_epochs);
        self
    }

    pub fn endless(mut self) -> Self {
        self.num_epochs = None;
        self
    }

    pub fn shuffled(mut self) -> Self {
        self.shuffle = true;
        self
    }

    pub fn with_task_spec(mut self, task_spec: TaskSpec) -> Self {
        self.task_spec = Some(task_spec);
        self
    }
}

/// A dataset whose records are turned into examples by a parser `P`.
pub struct InputDataset<P: ExampleParser> {
    descriptor: DatasetDescriptor,
    parser: Arc<P>,
    storage: Arc<dyn StorageBackend>,
    settings: PipelineSettings,
    size: OnceLock<u64>,
}

impl<P: ExampleParser> InputDataset<P> {
    pub fn new(descriptor: DatasetDescriptor, parser: P, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            descriptor,
            parser: Arc::new(parser),
            storage,
            settings: PipelineSettings::default(),
            size: OnceLock::new(),
        }
    }

    /// Creates a dataset over local storage from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &PipelineConfig, parser: P) -> Result<Self> {
        config.validate()?;

        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);
        let descriptor = config.dataset.descriptor()?;

        Ok(Self::new(descriptor, parser, storage).with_settings(config.settings()))
    }

    /// Replaces the runtime settings.
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Builds the reading pipeline and returns a cursor over its batches.
    ///
    /// Stages, in order: list the files matching the pattern, repeat them
    /// for `num_epochs`, read them (interleaved when shuffling, one after
    /// another otherwise), keep this worker's shard, shuffle, parse on
    /// `num_threads` threads and group into batches of `batch_size`.
    ///
    /// # Errors
    ///
    /// Returns an error, before reading any data, if:
    /// - `batch_size` is zero
    /// - `shuffle` is requested but the dataset has no shuffle size
    /// - the task spec's worker index is out of range
    /// - the parse buffer size overflows
    /// - the file pattern is invalid or listing fails
    pub fn read(&self, batch_size: usize, options: ReadOptions) -> Result<BatchIterator<P::Output>> {
        if batch_size == 0 {
            return Err(PipelineError::config("batch_size must be greater than 0"));
        }

        let shuffle_size = if options.shuffle {
            match self.descriptor.shuffle_size {
                Some(size) if size > 0 => Some(size),
                _ => return Err(PipelineError::config("shuffle_size has not been set")),
            }
        } else {
            None
        };

        if let Some(task) = &options.task_spec {
            task.validate()?;
        }

        let output_buffer =
            output_buffer_size(batch_size, cpu_count(), self.descriptor.min_queue_examples)?;

        let files = list_files(self.storage.as_ref(), &self.descriptor.data_files_pattern)?;
        if files.is_empty() {
            tracing::warn!(
                dataset = %self.descriptor.name,
                pattern = %self.descriptor.data_files_pattern,
                "no data files match pattern"
            );
        }

        let num_threads = self.settings.num_threads.max(1);

        tracing::debug!(
            dataset = %self.descriptor.name,
            files = files.len(),
            batch_size,
            epochs = ?options.num_epochs,
            shuffle = options.shuffle,
            task_spec = ?options.task_spec,
            num_threads,
            output_buffer,
            "building input pipeline"
        );

        let file_source = repeat_files(files, options.num_epochs);
        let source = self.record_source();

        let mut records: RecordStream = if options.shuffle {
            // One record at a time from each of num_threads open files
            Box::new(InterleaveReader::new(source, file_source, num_threads, 1))
        } else {
            Box::new(SequentialReader::new(source, file_source))
        };

        if let Some(task) = options.task_spec.filter(TaskSpec::is_distributed) {
            records = Box::new(ShardFilter::new(records, task));
        }

        if let Some(size) = shuffle_size {
            records = Box::new(ShuffleBuffer::new(records, size, self.settings.seed));
        }

        let parser = self.parser.clone();
        let parsed = ParallelMap::new(records, num_threads, output_buffer, move |record: Vec<u8>| {
            parser.parse(&record)
        });

        Ok(BatchIterator::new(Batcher::new(parsed, batch_size)))
    }

    /// Number of records in one pass over the data, unparsed and unsharded.
    ///
    /// Counted on first call by reading every file and cached afterwards.
    /// Read errors are returned and leave the cache empty.
    pub fn size(&self) -> Result<u64> {
        if let Some(size) = self.size.get() {
            return Ok(*size);
        }

        let count = self.count_records()?;
        Ok(*self.size.get_or_init(|| count))
    }

    fn count_records(&self) -> Result<u64> {
        let files = list_files(self.storage.as_ref(), &self.descriptor.data_files_pattern)?;
        let num_files = files.len();
        let reader = SequentialReader::new(self.record_source(), repeat_files(files, Some(1)));

        let mut count = 0u64;
        for record in reader {
            record?;
            count += 1;
        }

        tracing::info!(
            dataset = %self.descriptor.name,
            files = num_files,
            records = count,
            "counted dataset records"
        );
        Ok(count)
    }

    fn record_source(&self) -> RecordSource {
        RecordSource::new(
            self.storage.clone(),
            self.descriptor.reader.format(),
            self.settings.read_chunk_size,
        )
    }
}

impl<P: ExampleParser> std::fmt::Debug for InputDataset<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputDataset")
            .field("descriptor", &self.descriptor)
            .field("settings", &self.settings)
            .field("size", &self.size.get())
            .finish()
    }
}

/// Cursor over the batches produced by `InputDataset::read`.
///
/// `next_batch` returns `Ok(None)` once every epoch has been consumed, and
/// keeps returning it afterwards.
pub struct BatchIterator<T> {
    batches: Batcher<ParallelMap<T>, T>,
    finished: bool,
}

impl<T> BatchIterator<T> {
    fn new(batches: Batcher<ParallelMap<T>, T>) -> Self {
        Self {
            batches,
            finished: false,
        }
    }

    /// Gets the next batch.
    ///
    /// # Errors
    ///
    /// Returns the first read or parse error encountered while filling the
    /// batch. Reading may continue after an error.
    pub fn next_batch(&mut self) -> Result<Option<Batch<T>>> {
        if self.finished {
            return Ok(None);
        }

        match self.batches.next() {
            Some(Ok(batch)) => Ok(Some(batch)),
            Some(Err(e)) => Err(e),
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batches.batch_size()
    }

    /// Maximum number of parsed examples in flight.
    pub fn buffer_size(&self) -> usize {
        self.batches.get_ref().buffer_size()
    }
}

impl<T> Iterator for BatchIterator<T> {
    type Item = Result<Batch<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
