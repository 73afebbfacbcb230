//! The worker pool: a fixed number of threads draining a FIFO queue of
//! boxed closures.
//!
//! Sized to `num_cpus::get()` by default, bounded by hardware
//! concurrency. The queue itself is a `crossbeam-channel`, which
//! internally pairs a mutex with condvar wakeups, without hand rolling
//! it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};

use crate::error::*;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Builds a [`ThreadPool`] with a configurable thread count.
pub struct Builder {
    num_threads: Option<usize>,
}

impl Builder {
    /// Starts a new builder with no explicit thread count.
    pub fn new() -> Self {
        Self { num_threads: None }
    }

    /// Overrides the number of worker threads. Defaults to
    /// `num_cpus::get()` if never called.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Spawns the worker threads and returns the running pool.
    pub fn build(self) -> ThreadPool {
        let num_threads = self.num_threads.unwrap_or_else(num_cpus::get).max(1);
        let (sender, receiver) = unbounded::<Task>();

        let workers = (0..num_threads)
            .map(|_| {
                let receiver = receiver.clone();
                thread::spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        // A panicking routing decision must not take the
                        // whole worker thread down with it.
                        let _ = catch_unwind(AssertUnwindSafe(task));
                    }
                })
            })
            .collect();

        ThreadPool {
            sender: Some(sender),
            workers,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed pool of worker threads draining a shared FIFO queue.
pub struct ThreadPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Submits `task` to the pool's queue. Returns a `PoolShutdown`
    /// error if the pool has already been stopped.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.sender {
            Some(sender) => sender
                .send(Box::new(task))
                .simple(ErrorKind::PoolShutdown),
            None => Err(Error::simple(ErrorKind::PoolShutdown)),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Dropping the sender closes the channel; every worker's `recv`
        // returns `Err` once the queue drains, ending its loop.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
