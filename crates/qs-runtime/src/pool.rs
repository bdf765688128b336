use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use tracing::debug;

use qs_core::{DynamicValue, RuntimeFault, SourceTag};

use crate::script::{run_once, CompletionCallback, RunContext, RunState};

pub const DEFAULT_POOL_WORKERS: usize = 4;

const QUEUE_DEPTH_PER_WORKER: usize = 16;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool asynchronous executions are submitted to.
///
/// Submission blocks once the queue is full; there is no cancellation,
/// a submitted run always reaches a terminal state or dies with its
/// worker.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = bounded::<Job>(workers * QUEUE_DEPTH_PER_WORKER);

        let handles = (0..workers)
            .map(|index| {
                let receiver: Receiver<Job> = receiver.clone();
                thread::Builder::new()
                    .name(format!("qs-worker-{index}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
                    .expect("worker thread must spawn")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers: handles,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn submit_run(
        &self,
        ctx: RunContext,
        callback: Option<CompletionCallback>,
    ) -> ExecHandle {
        let (result_tx, result_rx) = bounded(1);
        let state = ctx.state_handle();

        let job: Job = Box::new(move || {
            let outcome = run_once(ctx, callback);
            // The caller may have dropped the handle already.
            let _ = result_tx.send(outcome);
        });

        debug!("submitting run to worker pool");
        self.sender
            .as_ref()
            .expect("pool accepts submissions until dropped")
            .send(job)
            .expect("workers outlive the pool handle");

        ExecHandle {
            result: result_rx,
            state,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

pub(crate) fn default_pool() -> &'static WorkerPool {
    static POOL: OnceLock<WorkerPool> = OnceLock::new();
    POOL.get_or_init(|| WorkerPool::new(DEFAULT_POOL_WORKERS))
}

/// Single-assignment result slot for one asynchronous run.
///
/// The caller owns join semantics; dropping the handle abandons the
/// result but never the run.
pub struct ExecHandle {
    result: Receiver<Result<DynamicValue, RuntimeFault>>,
    state: Arc<Mutex<RunState>>,
}

impl ExecHandle {
    /// Blocks until the run reaches a terminal state.
    pub fn join(self) -> Result<DynamicValue, RuntimeFault> {
        self.result.recv().unwrap_or_else(|_| {
            Err(RuntimeFault::new(
                "worker terminated before completing the run",
                SourceTag::unknown(),
            ))
        })
    }

    /// Non-blocking poll; `None` while the run is still in flight.
    pub fn try_join(&self) -> Option<Result<DynamicValue, RuntimeFault>> {
        match self.result.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RuntimeFault::new(
                "worker terminated before completing the run",
                SourceTag::unknown(),
            ))),
        }
    }

    /// State of the submitted run.
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
