//! Single background worker for learning appends

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use tracing::warn;

/// Queued learning updates before new ones are dropped
pub const LEARNING_QUEUE_CAPACITY: usize = 256;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Task {
    Run(Job),
    Flush(SyncSender<()>),
}

/// Bounded queue drained by one worker thread. Dropping the queue runs the
/// remaining jobs and joins the worker.
pub(crate) struct LearningQueue {
    sender: Option<SyncSender<Task>>,
    worker: Option<JoinHandle<()>>,
}

impl LearningQueue {
    pub(crate) fn start(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<Task>(capacity);
        let spawned = thread::Builder::new()
            .name("tierwise-learn".to_string())
            .spawn(move || {
                for task in receiver {
                    match task {
                        Task::Run(job) => {
                            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                                warn!("learning job panicked");
                            }
                        }
                        Task::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
            });

        match spawned {
            Ok(worker) => Self {
                sender: Some(sender),
                worker: Some(worker),
            },
            Err(e) => {
                warn!(error = %e, "cannot spawn learning worker, learning disabled");
                Self {
                    sender: None,
                    worker: None,
                }
            }
        }
    }

    /// Queue `job`. Returns false when the queue is full or the worker is gone.
    pub(crate) fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(Task::Run(Box::new(job))) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("learning queue full, update dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("learning worker stopped, update dropped");
                false
            }
        }
    }

    /// Block until every job queued before this call has run
    pub(crate) fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (done, wait) = mpsc::sync_channel(1);
        if sender.send(Task::Flush(done)).is_ok() {
            let _ = wait.recv();
        }
    }
}

impl Drop for LearningQueue {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("learning worker panicked");
            }
        }
    }
}
