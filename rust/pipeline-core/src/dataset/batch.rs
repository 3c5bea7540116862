// rust/pipeline-core/src/dataset/batch.rs

use crate::error::Result;

/// A batch of parsed examples.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    /// Examples in stream order. Only the final batch may be short.
    pub examples: Vec<T>,
    /// Zero-based position of this batch in the sequence.
    pub index: u64,
}

impl<T> Batch<T> {
    /// Number of examples in the batch
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn into_examples(self) -> Vec<T> {
        self.examples
    }
}

impl<A, B> Batch<(A, B)> {
    /// Splits a batch of `(inputs, outputs)` pairs into two columns.
    pub fn unzip(self) -> (Vec<A>, Vec<B>) {
        self.examples.into_iter().unzip()
    }
}

/// Groups a stream of examples into batches of `batch_size`.
///
/// The last batch holds whatever is left and may be smaller. An upstream
/// error is returned as soon as it is seen; examples already collected are
/// kept for the next batch.
pub struct Batcher<I, T> {
    inner: I,
    batch_size: usize,
    pending: Vec<T>,
    next_index: u64,
    upstream_done: bool,
}

impl<I, T> Batcher<I, T> {
    pub fn new(inner: I, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            inner,
            batch_size,
            pending: Vec::with_capacity(batch_size.min(4096)),
            next_index: 0,
            upstream_done: false,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The upstream iterator.
    pub fn get_ref(&self) -> &I {
        &self.inner
    }
}

impl<I, T> Iterator for Batcher<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<Batch<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.upstream_done && self.pending.len() < self.batch_size {
            match self.inner.next() {
                Some(Ok(example)) => self.pending.push(example),
                Some(Err(e)) => return Some(Err(e)),
                None => self.upstream_done = true,
            }
        }

        if self.pending.is_empty() {
            return None;
        }

        let capacity = self.batch_size.min(4096);
        let examples = std::mem::replace(&mut self.pending, Vec::with_capacity(capacity));
        let batch = Batch {
            examples,
            index: self.next_index,
        };
        self.next_index += 1;
        Some(Ok(batch))
    }
}
