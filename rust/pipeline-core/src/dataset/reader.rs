// rust/pipeline-core/src/dataset/reader.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::storage::{StorageBackend, StorageReader};

use super::files::FileSource;
use super::format::RecordFormat;

/// A stream of raw records (framing already stripped).
pub type RecordStream = Box<dyn Iterator<Item = Result<Vec<u8>>> + Send>;

/// Everything needed to open a record reader over one data file.
#[derive(Clone)]
pub struct RecordSource {
    storage: Arc<dyn StorageBackend>,
    format: Arc<dyn RecordFormat>,
    chunk_size: usize,
}

impl RecordSource {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        format: Arc<dyn RecordFormat>,
        chunk_size: usize,
    ) -> Self {
        Self {
            storage,
            format,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Creates a reader for `path`. The file is opened on the first read.
    pub fn open(&self, path: PathBuf) -> FileRecordReader {
        FileRecordReader {
            source: self.clone(),
            path,
            reader: None,
            file_offset: 0,
            buffer: Vec::new(),
            cursor: 0,
            records_read: 0,
            failed: false,
            finished: false,
        }
    }
}

impl std::fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSource")
            .field("format", &self.format.name())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// An iterator over the records of a single data file.
///
/// The file is read in `chunk_size` pieces through the storage backend and
/// split on record boundaries, so a record may span any number of chunks.
/// After an error the reader is finished and yields nothing more.
pub struct FileRecordReader {
    source: RecordSource,
    path: PathBuf,
    reader: Option<Box<dyn StorageReader>>,
    file_offset: u64,
    buffer: Vec<u8>,
    cursor: usize,
    records_read: u64,
    failed: bool,
    finished: bool,
}

impl FileRecordReader {
    /// Read the next record from the file.
    ///
    /// Returns `Ok(Some(record))` if a record was read, `Ok(None)` if the
    /// file is exhausted, or an error if reading fails or the file ends in
    /// the middle of a record.
    pub fn next_record(&mut self) -> Result<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }

        let result = self.read_record();
        match result {
            Ok(Some(_)) => {}
            Ok(None) => self.finished = true,
            Err(_) => {
                self.failed = true;
                self.finished = true;
            }
        }
        result
    }

    fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        if self.reader.is_none() {
            self.reader = Some(self.source.storage.open_read(&self.path)?);
        }

        loop {
            let format = &self.source.format;
            if let Some(end) = format.find_record_end(&self.buffer, self.cursor) {
                let record = format.payload(&self.buffer[self.cursor..end]).to_vec();
                self.cursor = end;
                self.records_read += 1;
                return Ok(Some(record));
            }

            if !self.fill_buffer()? {
                return self.take_tail();
            }
        }
    }

    /// Reads the next chunk into the buffer. Returns false at end of file.
    fn fill_buffer(&mut self) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };

        let size = reader.size();
        if self.file_offset >= size {
            return Ok(false);
        }

        // Drop consumed bytes before growing the buffer
        self.buffer.drain(..self.cursor);
        self.cursor = 0;

        let length = (self.source.chunk_size as u64).min(size - self.file_offset) as usize;
        let chunk = reader.read_range(self.file_offset, length)?;
        if chunk.is_empty() {
            self.file_offset = size;
            return Ok(false);
        }

        self.file_offset += chunk.len() as u64;
        self.buffer.extend_from_slice(&chunk);
        Ok(true)
    }

    fn take_tail(&mut self) -> Result<Option<Vec<u8>>> {
        let tail = &self.buffer[self.cursor..];
        if tail.is_empty() {
            return Ok(None);
        }

        let format = &self.source.format;
        if !format.allows_unterminated_tail() {
            return Err(PipelineError::dataset(
                self.path.display().to_string(),
                format!(
                    "truncated {} record: {} trailing bytes after record {}",
                    format.name(),
                    tail.len(),
                    self.records_read
                ),
            ));
        }

        let record = format.payload(tail).to_vec();
        self.cursor = self.buffer.len();
        self.records_read += 1;
        Ok(Some(record))
    }

    /// Number of records read so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Whether this reader has returned a record or an error.
    pub fn has_output(&self) -> bool {
        self.records_read > 0 || self.failed
    }

    /// Path of the file being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for FileRecordReader {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Reads a fixed list of files one after another, in order.
///
/// Stops once a full pass of the file list in a row has produced neither
/// records nor errors, so an endless source over empty files ends.
pub struct SequentialReader {
    source: RecordSource,
    files: FileSource,
    current: Option<FileRecordReader>,
    idle_files: usize,
}

impl SequentialReader {
    pub fn new(source: RecordSource, files: FileSource) -> Self {
        Self {
            source,
            files,
            current: None,
            idle_files: 0,
        }
    }
}

impl Iterator for SequentialReader {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                if self.idle_files > 0 && self.idle_files >= self.files.pass_len() {
                    tracing::debug!(files = self.idle_files, "no records in a full pass over the data files");
                    return None;
                }
                let path = self.files.next()?;
                tracing::trace!(path = %path.display(), "opening data file");
                self.current = Some(self.source.open(path));
            }

            let reader = self.current.as_mut()?;
            match reader.next() {
                Some(item) => {
                    self.idle_files = 0;
                    return Some(item);
                }
                None => {
                    if !reader.has_output() {
                        self.idle_files += 1;
                    }
                    self.current = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::format::{FixedSizeFormat, LengthPrefixedFormat, TextLineFormat};
    use crate::dataset::files::repeat_files;
    use crate::dataset::testing::{lines, MemoryStorage};

    fn source(storage: Arc<MemoryStorage>, format: Arc<dyn RecordFormat>, chunk: usize) -> RecordSource {
        RecordSource::new(storage, format, chunk)
    }

    fn collect(reader: impl Iterator<Item = Result<Vec<u8>>>) -> Vec<String> {
        reader
            .map(|r| String::from_utf8(r.unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_text_lines_across_chunks() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("a.txt", lines("line", 5));

        // Chunk smaller than a line forces records to span reads
        let src = source(storage, Arc::new(TextLineFormat::new()), 3);
        let records = collect(src.open(PathBuf::from("a.txt")));

        assert_eq!(records, vec!["line0", "line1", "line2", "line3", "line4"]);
    }

    #[test]
    fn test_text_unterminated_last_line() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("a.txt", b"first\r\n\nlast".to_vec());

        let src = source(storage, Arc::new(TextLineFormat::new()), 1024);
        let records = collect(src.open(PathBuf::from("a.txt")));

        assert_eq!(records, vec!["first", "", "last"]);
    }

    #[test]
    fn test_empty_file_has_no_records() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("empty.txt", Vec::new());

        let src = source(storage, Arc::new(TextLineFormat::new()), 16);
        let mut reader = src.open(PathBuf::from("empty.txt"));
        assert!(reader.next_record().unwrap().is_none());
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_fixed_size_truncated_tail() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("a.bin", vec![7u8; 10]);

        let src = source(storage, Arc::new(FixedSizeFormat::new(4)), 3);
        let mut reader = src.open(PathBuf::from("a.bin"));

        assert_eq!(reader.next_record().unwrap(), Some(vec![7u8; 4]));
        assert_eq!(reader.next_record().unwrap(), Some(vec![7u8; 4]));
        assert!(matches!(
            reader.next_record(),
            Err(PipelineError::Dataset { .. })
        ));
        // Finished after an error
        assert!(reader.next_record().unwrap().is_none());
        assert_eq!(reader.records_read(), 2);
    }

    #[test]
    fn test_length_prefixed_records() {
        let mut data = Vec::new();
        for word in ["alpha", "", "gamma"] {
            data.extend_from_slice(&(word.len() as u32).to_be_bytes());
            data.extend_from_slice(word.as_bytes());
        }
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("a.rec", data);

        let src = source(storage, Arc::new(LengthPrefixedFormat::new()), 5);
        let records = collect(src.open(PathBuf::from("a.rec")));

        assert_eq!(records, vec!["alpha", "", "gamma"]);
    }

    #[test]
    fn test_missing_file_errors_once() {
        let storage = Arc::new(MemoryStorage::new());
        let src = source(storage, Arc::new(TextLineFormat::new()), 16);
        let mut reader = src.open(PathBuf::from("missing.txt"));

        assert!(matches!(reader.next(), Some(Err(PipelineError::Storage { .. }))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_file_opened_lazily() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("a.txt", lines("x", 1));

        let src = source(storage.clone(), Arc::new(TextLineFormat::new()), 16);
        let mut reader = src.open(PathBuf::from("a.txt"));
        assert_eq!(storage.opens(), 0);

        reader.next_record().unwrap();
        assert_eq!(storage.opens(), 1);
        assert_eq!(reader.path(), Path::new("a.txt"));
    }

    #[test]
    fn test_sequential_reader_order() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("a.txt", lines("a", 2));
        storage.add_file("b.txt", Vec::new());
        storage.add_file("c.txt", lines("c", 2));

        let files = vec![
            PathBuf::from("a.txt"),
            PathBuf::from("b.txt"),
            PathBuf::from("c.txt"),
        ];
        let src = source(storage, Arc::new(TextLineFormat::new()), 4);
        let reader = SequentialReader::new(src, repeat_files(files, Some(1)));

        assert_eq!(collect(reader), vec!["a0", "a1", "c0", "c1"]);
    }

    #[test]
    fn test_sequential_reader_continues_after_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("a.txt", lines("a", 1));
        storage.add_file("bad.txt", lines("b", 1));
        storage.add_file("c.txt", lines("c", 1));
        storage.fail_reads("bad.txt");

        let files = vec![
            PathBuf::from("a.txt"),
            PathBuf::from("bad.txt"),
            PathBuf::from("c.txt"),
        ];
        let src = source(storage, Arc::new(TextLineFormat::new()), 4);
        let results: Vec<_> = SequentialReader::new(src, repeat_files(files, Some(1))).collect();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), b"a0");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap(), b"c0");
    }

    #[test]
    fn test_sequential_reader_endless_over_empty_files_ends() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("a.txt", Vec::new());
        storage.add_file("b.txt", Vec::new());

        let files = vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")];
        let src = source(storage.clone(), Arc::new(TextLineFormat::new()), 4);
        let mut reader = SequentialReader::new(src, repeat_files(files, None));

        assert!(reader.next().is_none());
        assert_eq!(storage.opens(), 2);
    }

    #[test]
    fn test_sequential_reader_endless_skips_empty_files() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("a.txt", lines("a", 1));
        storage.add_file("b.txt", Vec::new());

        let files = vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")];
        let src = source(storage, Arc::new(TextLineFormat::new()), 4);
        let records = collect(SequentialReader::new(src, repeat_files(files, None)).take(5));

        assert_eq!(records, vec!["a0"; 5]);
    }

    #[test]
    fn test_has_output() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_file("a.txt", lines("a", 1));
        storage.add_file("empty.txt", Vec::new());
        let src = source(storage, Arc::new(TextLineFormat::new()), 4);

        let mut empty = src.open(PathBuf::from("empty.txt"));
        assert!(empty.next().is_none());
        assert!(!empty.has_output());

        let mut missing = src.open(PathBuf::from("missing.txt"));
        assert!(missing.next().unwrap().is_err());
        assert!(missing.has_output());

        let mut full = src.open(PathBuf::from("a.txt"));
        full.next().unwrap().unwrap();
        assert!(full.has_output());
    }
}
