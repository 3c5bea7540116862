// rust/pipeline-core/src/dataset/shuffle.rs

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;

/// Approximate shuffle through a fixed-size buffer.
///
/// The buffer is filled from upstream; each output is a uniformly random
/// buffered element, whose place is taken by the next upstream element.
/// Once upstream ends the buffer is drained in random order. Records further
/// apart than `capacity` keep their relative order with high probability, so
/// the buffer should be large compared to a single file.
///
/// Upstream errors are returned immediately rather than buffered.
pub struct ShuffleBuffer<I, T> {
    inner: I,
    buffer: Vec<T>,
    capacity: usize,
    rng: StdRng,
    upstream_done: bool,
}

impl<I, T> ShuffleBuffer<I, T> {
    /// Creates a shuffle buffer. Uses a fixed `seed` when given, otherwise
    /// seeds from system entropy.
    pub fn new(inner: I, capacity: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let capacity = capacity.max(1);

        Self {
            inner,
            buffer: Vec::with_capacity(capacity.min(64 * 1024)),
            capacity,
            rng,
            upstream_done: false,
        }
    }

    /// Number of elements currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl<I, T> Iterator for ShuffleBuffer<I, T>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.upstream_done && self.buffer.len() < self.capacity {
            match self.inner.next() {
                Some(Ok(item)) => self.buffer.push(item),
                Some(Err(e)) => return Some(Err(e)),
                None => self.upstream_done = true,
            }
        }

        if self.buffer.is_empty() {
            return None;
        }

        let index = self.rng.gen_range(0..self.buffer.len());
        Some(Ok(self.buffer.swap_remove(index)))
    }
}
