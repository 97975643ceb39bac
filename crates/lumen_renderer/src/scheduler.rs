//! Fixed-size pool of worker threads running submitted work units.
//!
//! One mutex guards the FIFO queue and the termination flag; a condition
//! variable wakes an idle worker when work arrives or shutdown starts.
//! Workers pop under the lock and run the work unit after releasing it.
//!
//! Shutdown does not drain the queue: work units that have not started by
//! then are dropped, and their handles resolve to
//! [`RenderError::TaskAbandoned`].

use crate::{RenderError, RenderResult};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    jobs: VecDeque<Job>,
    terminate: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    new_task: Condvar,
    submitted: AtomicU64,
}

/// Thread pool executing zero-argument work units.
pub struct TaskScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskScheduler {
    /// Pool sized from the hardware, see [`TaskScheduler::default_worker_count`].
    pub fn new() -> RenderResult<Self> {
        Self::with_workers(Self::default_worker_count())
    }

    /// One worker per hardware thread minus one, and at least one.
    pub fn default_worker_count() -> usize {
        num_cpus::get().saturating_sub(1).max(1)
    }

    /// Pool with exactly `worker_count` threads.
    pub fn with_workers(worker_count: usize) -> RenderResult<Self> {
        if worker_count == 0 {
            return Err(RenderError::InvalidSettings(
                "scheduler needs at least one worker".into(),
            ));
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                terminate: false,
            }),
            new_task: Condvar::new(),
            submitted: AtomicU64::new(0),
        });

        let mut scheduler = Self {
            shared,
            workers: Vec::with_capacity(worker_count),
        };

        for worker_id in 0..worker_count {
            let shared = Arc::clone(&scheduler.shared);
            // On error the partially built pool is shut down by Drop
            let handle = thread::Builder::new()
                .name(format!("lumen-worker{worker_id}"))
                .spawn(move || worker_loop(&shared))?;
            scheduler.workers.push(handle);
        }

        log::info!("Task scheduler started with {} workers", worker_count);
        Ok(scheduler)
    }

    /// Queue `work` and return a handle to its result. Never blocks.
    pub fn submit<F, T>(&self, work: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = sync_channel(1);
        let id = self.shared.submitted.fetch_add(1, Ordering::Relaxed);

        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(work));
            // The caller may have dropped its handle
            let _ = tx.send(result);
        });

        let mut queue = self.shared.queue.lock();
        if queue.terminate {
            // Dropping the job drops the sender; the handle reports it
            log::warn!("Work unit {} submitted after shutdown, dropping it", id);
        } else {
            queue.jobs.push_back(job);
            self.shared.new_task.notify_one();
        }

        TaskHandle { id, rx }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of work units submitted since construction.
    pub fn submitted(&self) -> u64 {
        self.shared.submitted.load(Ordering::Relaxed)
    }

    /// Number of work units waiting for a worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// Stop every worker and join them. Queued work that has not started is
    /// dropped; returns how many units that was.
    pub fn shutdown(&mut self) -> usize {
        let dropped = {
            let mut queue = self.shared.queue.lock();
            queue.terminate = true;
            let dropped = std::mem::take(&mut queue.jobs);
            self.shared.new_task.notify_all();
            dropped
        };
        let dropped_count = dropped.len();
        // Dropped outside the lock; each drop closes a handle's channel
        drop(dropped);

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Worker thread panicked outside of a work unit");
            }
        }

        if dropped_count > 0 {
            log::warn!("Scheduler shut down with {} queued work units dropped", dropped_count);
        } else {
            log::debug!("Scheduler shut down");
        }
        dropped_count
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            while queue.jobs.is_empty() && !queue.terminate {
                shared.new_task.wait(&mut queue);
            }
            if queue.terminate {
                break;
            }
            queue.jobs.pop_front()
        };

        if let Some(job) = job {
            job();
        }
    }
}

/// One-shot handle to the result of a submitted work unit.
pub struct TaskHandle<T> {
    id: u64,
    rx: Receiver<thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Submission number of the work unit.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the work unit has run and return its value.
    ///
    /// A panic inside the work unit comes back as
    /// [`RenderError::TaskPanicked`]; a unit dropped by shutdown as
    /// [`RenderError::TaskAbandoned`].
    pub fn wait(self) -> RenderResult<T> {
        match self.rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(RenderError::TaskPanicked(panic_message(payload.as_ref()))),
            Err(_) => Err(RenderError::TaskAbandoned),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
