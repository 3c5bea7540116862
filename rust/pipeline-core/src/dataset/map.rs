// rust/pipeline-core/src/dataset/map.rs

//! Parallel, order-preserving map over a record stream.
//!
//! A dispatcher thread pulls elements from upstream and hands them to a pool
//! of worker threads; results are reassembled in input order on the
//! consumer side. The number of elements dispatched but not yet returned to
//! the consumer never exceeds `buffer_size`. The window is a counter, so a
//! large `buffer_size` costs nothing until elements actually flow.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver};

use crate::error::{PipelineError, Result};

type Sequenced<T> = (u64, Result<T>);

/// Counts elements in flight and blocks the dispatcher at the limit.
struct Window {
    state: Mutex<WindowState>,
    changed: Condvar,
    limit: usize,
}

#[derive(Default)]
struct WindowState {
    in_flight: usize,
    closed: bool,
}

impl Window {
    fn new(limit: usize) -> Self {
        Self {
            state: Mutex::new(WindowState::default()),
            changed: Condvar::new(),
            limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for room. Returns false once the window is closed.
    fn acquire(&self) -> bool {
        let mut state = self.lock();
        while !state.closed && state.in_flight >= self.limit {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return false;
        }
        state.in_flight += 1;
        true
    }

    fn release(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        self.changed.notify_one();
    }

    fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }
}

/// Applies a function to every upstream element on `num_threads` threads,
/// yielding the results in upstream order.
pub struct ParallelMap<T> {
    output: Option<Receiver<Sequenced<T>>>,
    window: Arc<Window>,
    reorder: BTreeMap<u64, Result<T>>,
    next_seq: u64,
    threads: Vec<JoinHandle<()>>,
    buffer_size: usize,
    finished: bool,
}

impl<T: Send + 'static> ParallelMap<T> {
    /// Spawns the dispatcher and `num_threads` workers.
    ///
    /// Upstream errors are forwarded in order without calling `f`. A panic
    /// inside `f` is reported as a parse error for that element.
    pub fn new<I, U, F>(upstream: I, num_threads: usize, buffer_size: usize, f: F) -> Self
    where
        I: Iterator<Item = Result<U>> + Send + 'static,
        U: Send + 'static,
        F: Fn(U) -> Result<T> + Send + Sync + 'static,
    {
        let num_threads = num_threads.max(1);
        let buffer_size = buffer_size.max(1);

        // Work is handed over one element per worker; results queue up to
        // the window limit
        let (work_tx, work_rx) = channel::bounded::<Sequenced<U>>(num_threads);
        let (output_tx, output_rx) = channel::unbounded::<Sequenced<T>>();
        let window = Arc::new(Window::new(buffer_size));

        let mut threads = Vec::with_capacity(num_threads + 1);

        let dispatch_window = window.clone();
        threads.push(thread::spawn(move || {
            let mut upstream = upstream;
            let mut seq = 0u64;
            loop {
                // Wait for room before pulling from upstream
                if !dispatch_window.acquire() {
                    return; // Consumer dropped
                }
                let Some(item) = upstream.next() else {
                    return; // Upstream exhausted; dropping work_tx stops the workers
                };
                if work_tx.send((seq, item)).is_err() {
                    return;
                }
                seq += 1;
            }
        }));

        let f = Arc::new(f);
        for _ in 0..num_threads {
            let work_rx = work_rx.clone();
            let output_tx = output_tx.clone();
            let f = f.clone();

            threads.push(thread::spawn(move || {
                for (seq, item) in work_rx.iter() {
                    let result = item.and_then(|value| {
                        panic::catch_unwind(AssertUnwindSafe(|| f(value))).unwrap_or_else(|_| {
                            Err(PipelineError::parse(format!("parser panicked on element {seq}")))
                        })
                    });
                    if output_tx.send((seq, result)).is_err() {
                        return; // Consumer dropped
                    }
                }
            }));
        }

        Self {
            output: Some(output_rx),
            window,
            reorder: BTreeMap::new(),
            next_seq: 0,
            threads,
            buffer_size,
            finished: false,
        }
    }
}

impl<T> ParallelMap<T> {
    /// Maximum number of elements in flight.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn release(&mut self, result: Result<T>) -> Option<Result<T>> {
        self.next_seq += 1;
        self.window.release();
        Some(result)
    }

    fn shutdown(&mut self) {
        // Closing the window and the output unblocks the dispatcher and
        // every worker
        self.window.close();
        self.output.take();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl<T> Iterator for ParallelMap<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if let Some(result) = self.reorder.remove(&self.next_seq) {
            return self.release(result);
        }

        loop {
            let received = self.output.as_ref()?.recv();
            match received {
                Ok((seq, result)) if seq == self.next_seq => return self.release(result),
                Ok((seq, result)) => {
                    self.reorder.insert(seq, result);
                }
                Err(_) => {
                    // All workers are gone and everything has been delivered
                    self.finished = true;
                    self.shutdown();
                    return None;
                }
            }
        }
    }
}

impl<T> Drop for ParallelMap<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
