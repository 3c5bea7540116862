// rust/pipeline-core/src/dataset/interleave.rs

//! Interleaved reading across several data files.

use crate::error::Result;

use super::files::FileSource;
use super::reader::{FileRecordReader, RecordSource};

/// A round-robin reader that keeps up to `cycle_length` files open and takes
/// `block_length` consecutive records from each before moving to the next.
///
/// When a file is exhausted its slot is refilled with the next pending file,
/// so the output mixes records from many files even though each file is
/// read sequentially. With `block_length == 1` this approximates random
/// access order across the files.
///
/// Once a full pass of the file list in a row has been opened and found
/// empty, no further files are opened, so an endless source over empty
/// files ends.
pub struct InterleaveReader {
    source: RecordSource,
    pending: FileSource,
    pending_exhausted: bool,
    slots: Vec<Option<FileRecordReader>>,
    block_length: usize,
    current_index: usize,
    taken_in_block: usize,
    idle_files: usize,
}

impl InterleaveReader {
    /// Creates a new interleaving reader. Zero lengths are treated as one.
    pub fn new(
        source: RecordSource,
        files: FileSource,
        cycle_length: usize,
        block_length: usize,
    ) -> Self {
        let cycle_length = cycle_length.max(1);
        Self {
            source,
            pending: files,
            pending_exhausted: false,
            slots: (0..cycle_length).map(|_| None).collect(),
            block_length: block_length.max(1),
            current_index: 0,
            taken_in_block: 0,
            idle_files: 0,
        }
    }

    /// Number of reader slots.
    pub fn cycle_length(&self) -> usize {
        self.slots.len()
    }

    /// Number of files currently open.
    pub fn open_files(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn advance(&mut self) {
        self.current_index = (self.current_index + 1) % self.slots.len();
        self.taken_in_block = 0;
    }

    fn next_pending(&mut self) -> Option<FileRecordReader> {
        if self.pending_exhausted {
            return None;
        }
        match self.pending.next() {
            Some(path) => {
                tracing::trace!(path = %path.display(), "interleave opening data file");
                Some(self.source.open(path))
            }
            None => {
                self.pending_exhausted = true;
                None
            }
        }
    }

    /// Gets the next record, rotating through the open files.
    pub fn next_record(&mut self) -> Option<Result<Vec<u8>>> {
        loop {
            if self.slots[self.current_index].is_none() {
                self.slots[self.current_index] = self.next_pending();
            }

            if self.pending_exhausted && self.open_files() == 0 {
                return None;
            }

            let Some(reader) = self.slots[self.current_index].as_mut() else {
                // Nothing left to put in this slot
                self.advance();
                continue;
            };

            match reader.next() {
                Some(item) => {
                    self.idle_files = 0;
                    self.taken_in_block += 1;
                    if self.taken_in_block >= self.block_length || item.is_err() {
                        self.advance();
                    }
                    return Some(item);
                }
                None => {
                    if !reader.has_output() {
                        self.idle_files += 1;
                        if self.idle_files >= self.pending.pass_len() {
                            tracing::debug!(
                                files = self.idle_files,
                                "no records in a full pass over the data files"
                            );
                            self.pending_exhausted = true;
                        }
                    }
                    // Exhausted; the slot is refilled on its next visit
                    self.slots[self.current_index] = None;
                    self.advance();
                }
            }
        }
    }
}

impl Iterator for InterleaveReader {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}
