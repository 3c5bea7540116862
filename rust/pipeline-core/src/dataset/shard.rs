// rust/pipeline-core/src/dataset/shard.rs

use crate::error::{PipelineError, Result};

/// Identifies this worker within a distributed training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// Total number of workers reading the dataset.
    pub num_workers: u32,
    /// Index of this worker, in `0..num_workers`.
    pub index: u32,
}

impl TaskSpec {
    pub fn new(num_workers: u32, index: u32) -> Self {
        Self { num_workers, index }
    }

    /// Whether records must be split between workers.
    pub fn is_distributed(&self) -> bool {
        self.num_workers > 1
    }

    /// Checks that the worker index is in range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidShard` if `index >= num_workers`.
    pub fn validate(&self) -> Result<()> {
        if self.index >= self.num_workers {
            return Err(PipelineError::invalid_shard(self.index, self.num_workers));
        }
        Ok(())
    }
}

/// Keeps the elements whose position modulo `num_workers` equals `index`.
///
/// Assignment is by position in the stream, not by content, and is never
/// rebalanced: workers may receive up to one element more than each other.
/// Errors pass through to every worker without consuming a position.
pub struct ShardFilter<I> {
    inner: I,
    num_workers: u64,
    index: u64,
    position: u64,
}

impl<I> ShardFilter<I> {
    pub fn new(inner: I, task: TaskSpec) -> Self {
        Self {
            inner,
            num_workers: u64::from(task.num_workers.max(1)),
            index: u64::from(task.index),
            position: 0,
        }
    }
}

impl<I, T> Iterator for ShardFilter<I>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.inner.next()?;
            if item.is_err() {
                return Some(item);
            }

            let position = self.position;
            self.position += 1;
            if position % self.num_workers == self.index {
                return Some(item);
            }
        }
    }
}
