//! Bounded-concurrency dispatch of jobs onto a fixed-size worker pool.
//!
//! A job holds one semaphore permit from submission until its handler
//! returns, so at most `pool_size` handlers are ever in flight. Stop is
//! cooperative: it prevents new handler invocations but never preempts a
//! running one.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::HandlerError;
use crate::handler::JobHandler;
use crate::job::{Job, Outcome};
use crate::session::RunState;
use crate::stats::StatsAggregator;

/// How one dispatch call ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Jobs whose handler ran to completion (successfully or not).
    pub completed: usize,
    /// Jobs dropped because a stop was requested before their handler ran.
    pub abandoned: usize,
}

impl BatchResult {
    fn absorb(&mut self, other: BatchResult) {
        self.completed += other.completed;
        self.abandoned += other.abandoned;
    }
}

/// Timing knobs for a [`Dispatcher`].
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    pub pool_size: usize,
    pub handler_timeout: Duration,
    pub pause_poll: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            pool_size: 5,
            handler_timeout: Duration::from_secs(30),
            pause_poll: Duration::from_secs(1),
        }
    }
}

enum Finished {
    Completed,
    Abandoned,
}

pub struct Dispatcher<H> {
    handler: Arc<H>,
    state: RunState,
    stats: Arc<StatsAggregator>,
    options: DispatchOptions,
}

impl<H: JobHandler> Dispatcher<H> {
    pub fn new(
        handler: Arc<H>,
        state: RunState,
        stats: Arc<StatsAggregator>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            handler,
            state,
            stats,
            options: DispatchOptions {
                pool_size: options.pool_size.max(1),
                ..options
            },
        }
    }

    pub fn pool_size(&self) -> usize {
        self.options.pool_size
    }

    /// Runs every job through the pool and waits for all of them.
    ///
    /// Jobs not yet submitted when a stop is observed are abandoned; in-flight
    /// jobs run to completion.
    pub async fn run_batch<I>(&self, jobs: I) -> BatchResult
    where
        I: IntoIterator<Item = Job>,
    {
        let semaphore = Arc::new(Semaphore::new(self.options.pool_size));
        let mut workers = JoinSet::new();
        let mut result = BatchResult::default();

        let mut jobs = jobs.into_iter();
        while let Some(job) = jobs.next() {
            if self.state.is_stop_requested() {
                result.abandoned += 1 + jobs.by_ref().count();
                break;
            }
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            self.spawn_worker(&mut workers, job, permit);
        }

        result.absorb(drain(&mut workers).await);
        debug!(
            completed = result.completed,
            abandoned = result.abandoned,
            "batch finished"
        );
        result
    }

    /// Dispatches jobs as they arrive on `rx` until the channel closes or a
    /// stop is requested, then waits for in-flight jobs.
    pub async fn run_stream(&self, mut rx: mpsc::Receiver<Job>) -> BatchResult {
        let semaphore = Arc::new(Semaphore::new(self.options.pool_size));
        let mut workers = JoinSet::new();
        let mut result = BatchResult::default();

        loop {
            while let Some(joined) = workers.try_join_next() {
                result.absorb(tally(joined));
            }
            if self.state.is_stop_requested() {
                break;
            }
            // Bounded wait so a stop is noticed even when nothing arrives.
            let job = match timeout(self.options.pause_poll, rx.recv()).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(_) => continue,
            };
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            self.spawn_worker(&mut workers, job, permit);
        }

        rx.close();
        while rx.try_recv().is_ok() {
            result.abandoned += 1;
        }
        result.absorb(drain(&mut workers).await);
        result
    }

    fn spawn_worker(
        &self,
        workers: &mut JoinSet<(Job, Result<Finished, JoinError>)>,
        job: Job,
        permit: OwnedSemaphorePermit,
    ) {
        let handler = Arc::clone(&self.handler);
        let state = self.state.clone();
        let stats = Arc::clone(&self.stats);
        let outer_stats = Arc::clone(&self.stats);
        let options = self.options;

        // The handler runs in its own task so a panic surfaces as a JoinError
        // on the inner handle instead of losing the job.
        workers.spawn(async move {
            let _permit = permit;
            let inner_job = job.clone();
            let joined = tokio::spawn(async move {
                if !state.wait_while_paused(options.pause_poll).await {
                    debug!(job = %inner_job, "abandoned after stop");
                    return Finished::Abandoned;
                }
                let outcome = invoke(handler.as_ref(), &inner_job, options.handler_timeout).await;
                if let Outcome::Failure(reason) = &outcome {
                    warn!(job = %inner_job, %reason, "job failed");
                }
                stats.record(&outcome);
                Finished::Completed
            })
            .await;
            if joined.is_err() {
                outer_stats.record(&Outcome::Failure(HandlerError::Failed(
                    "handler panicked".into(),
                )));
            }
            (job, joined)
        });
    }
}

async fn invoke<H: JobHandler>(handler: &H, job: &Job, limit: Duration) -> Outcome {
    match timeout(limit, handler.handle(job)).await {
        Ok(result) => Outcome::from(result),
        Err(_) => Outcome::Failure(HandlerError::Timeout(limit)),
    }
}

fn tally(
    joined: Result<(Job, Result<Finished, JoinError>), JoinError>,
) -> BatchResult {
    match joined {
        Ok((_, Ok(Finished::Completed))) => BatchResult {
            completed: 1,
            abandoned: 0,
        },
        Ok((_, Ok(Finished::Abandoned))) => BatchResult {
            completed: 0,
            abandoned: 1,
        },
        Ok((job, Err(e))) => {
            warn!(job = %job, error = %e, "handler task panicked");
            BatchResult {
                completed: 1,
                abandoned: 0,
            }
        }
        Err(e) => {
            warn!(error = %e, "worker task lost");
            BatchResult::default()
        }
    }
}

async fn drain(workers: &mut JoinSet<(Job, Result<Finished, JoinError>)>) -> BatchResult {
    let mut result = BatchResult::default();
    while let Some(joined) = workers.join_next().await {
        result.absorb(tally(joined));
    }
    if result.completed + result.abandoned > 0 {
        info!(
            completed = result.completed,
            abandoned = result.abandoned,
            "workers drained"
        );
    }
    result
}
