//! Designated-executor contract for thread-affine storage work.
//!
//! # Responsibility
//! - Define the serialized execution domain required by affinity-bound
//!   lazy slots and by store teardown.
//! - Provide `SerialExecutor`, the single worker-thread implementation
//!   handed to hosts that do not bring their own runloop.
//!
//! # Invariants
//! - Tasks submitted to one executor run on exactly one thread, in
//!   submission order.
//! - A task running via `run_sync` observes `is_current() == true`.
//! - A panic inside a submitted task resumes on the submitting thread;
//!   the worker thread keeps serving later tasks.
//!
//! # See also
//! - docs/architecture/data-stack.md

use log::{debug, error};
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle, ThreadId};

/// Boxed unit of work accepted by [`Executor::execute`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Serialized execution domain for affinity-bound operations.
///
/// The storage layer assumes single-threaded access to live store state,
/// so context creation and store teardown both funnel through one of
/// these.
pub trait Executor: Send + Sync {
    /// Enqueues `task` without waiting for completion.
    fn execute(&self, task: Task);

    /// Returns whether the calling thread is the executor thread.
    fn is_current(&self) -> bool;
}

/// Blocking helpers layered over the object-safe [`Executor`] contract.
pub trait ExecutorExt {
    /// Runs `task` on the executor thread and blocks until it completes.
    ///
    /// Calls from the executor thread itself run inline without a queue
    /// hop, so nested submissions cannot deadlock. A panic raised by
    /// `task` is resumed on the calling thread.
    fn run_sync<R, F>(&self, task: F) -> R
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static;
}

impl<E: Executor + ?Sized> ExecutorExt for E {
    fn run_sync<R, F>(&self, task: F) -> R
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_current() {
            return task();
        }

        let (done_tx, done_rx) = mpsc::channel();
        self.execute(Box::new(move || {
            // Catch here so the payload travels back to the submitter
            // instead of unwinding through the worker loop.
            let outcome = catch_unwind(AssertUnwindSafe(task));
            let _ = done_tx.send(outcome);
        }));

        match done_rx.recv() {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) => resume_unwind(payload),
            Err(_) => panic!("executor dropped a submitted task before completion"),
        }
    }
}

/// Single worker thread draining a FIFO task queue.
///
/// Dropping the executor closes the queue and joins the worker after it
/// drains the tasks already submitted.
pub struct SerialExecutor {
    queue: Option<Sender<Task>>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl SerialExecutor {
    /// Spawns the worker thread under `name`.
    ///
    /// # Errors
    /// Returns the underlying I/O error when the OS refuses a new thread.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (queue, tasks) = mpsc::channel::<Task>();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(task) = tasks.recv() {
                    // One bad task must not take the whole executor down.
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!("event=executor_task_panicked module=exec status=error");
                    }
                }
                debug!("event=executor_stopped module=exec status=ok");
            })?;
        let worker_id = worker.thread().id();

        Ok(Self {
            queue: Some(queue),
            worker: Some(worker),
            worker_id,
        })
    }
}

impl Executor for SerialExecutor {
    fn execute(&self, task: Task) {
        let Some(queue) = self.queue.as_ref() else {
            error!("event=executor_submit module=exec status=error reason=shut_down");
            return;
        };
        if queue.send(task).is_err() {
            error!("event=executor_submit module=exec status=error reason=worker_exited");
        }
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.worker_id
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain and exit.
        self.queue.take();
        if let Some(worker) = self.worker.take() {
            // A task owning the last handle can drop us from the worker
            // itself; joining the current thread would deadlock.
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}
