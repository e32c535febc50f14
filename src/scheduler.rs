//! Rate-limited, bounded-concurrency execution of independent batch tasks
//!
//! Every dispatch waits for a slot from the shared [`RateLimiter`], so the
//! request rate stays under the ceiling no matter how many tasks are in
//! flight. Per-task errors are returned in the result list instead of
//! aborting sibling tasks; only the first task can abort the whole run, and
//! only under [`FirstBatchPolicy::FailFast`].

use std::future::Future;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::{FetchConfig, FirstBatchPolicy};
use crate::error::{Error, Result};
use crate::rate_limiter::RateLimiter;
use crate::types::FetchPhase;

/// Executes batch tasks under a rate ceiling and a concurrency bound
#[derive(Clone, Debug)]
pub struct Scheduler {
    limiter: RateLimiter,
    max_concurrency: usize,
    policy: FirstBatchPolicy,
}

impl Scheduler {
    /// Create a scheduler dispatching through `limiter`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] when `max_concurrency` is zero.
    pub fn new(
        limiter: RateLimiter,
        max_concurrency: usize,
        policy: FirstBatchPolicy,
    ) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(Error::config(
                "max_concurrency must be greater than zero",
                "max_concurrency",
            ));
        }
        Ok(Self {
            limiter,
            max_concurrency,
            policy,
        })
    }

    /// Create a scheduler from the fetch configuration
    pub fn from_config(config: &FetchConfig, limiter: RateLimiter) -> Result<Self> {
        Self::new(limiter, config.max_concurrency, config.first_batch)
    }

    /// Rate limiter shared by every dispatch of this scheduler
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Run `tasks` and return one result per task, in submission order
    ///
    /// Under [`FirstBatchPolicy::FailFast`] the first task runs alone before
    /// any other is dispatched; if it fails, its error is returned and no
    /// other task is started. The remaining tasks (or all of them under
    /// [`FirstBatchPolicy::Concurrent`]) run with at most `max_concurrency`
    /// in flight, and their errors are captured per task.
    ///
    /// `cancel` is checked before every dispatch. Tasks not yet dispatched
    /// when it fires resolve to [`Error::Cancelled`]; tasks in flight finish
    /// and keep their outcome.
    ///
    /// `on_phase` observes the phase transitions of the run.
    pub async fn run<T, F, Fut>(
        &self,
        tasks: Vec<F>,
        cancel: &CancellationToken,
        on_phase: impl Fn(FetchPhase),
    ) -> Result<Vec<Result<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut results = Vec::with_capacity(tasks.len());
        let mut tasks = tasks.into_iter();

        if self.policy == FirstBatchPolicy::FailFast
            && let Some(first) = tasks.next()
        {
            on_phase(FetchPhase::FirstBatchFetch);
            match self.dispatch(first, cancel).await {
                Ok(value) => {
                    on_phase(FetchPhase::FirstBatchOk);
                    results.push(Ok(value));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "first batch failed, aborting");
                    on_phase(FetchPhase::Aborted);
                    return Err(e);
                }
            }
        }

        let remaining: Vec<F> = tasks.collect();
        if !remaining.is_empty() {
            on_phase(FetchPhase::ConcurrentFetchRemaining);
            results.extend(self.run_concurrent(remaining, cancel).await);
        }

        Ok(results)
    }

    /// Run every task with bounded concurrency; results in submission order
    async fn run_concurrent<T, F, Fut>(
        &self,
        tasks: Vec<F>,
        cancel: &CancellationToken,
    ) -> Vec<Result<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut indexed: Vec<(usize, Result<T>)> = stream::iter(tasks.into_iter().enumerate())
            .map(|(index, task)| async move { (index, self.dispatch(task, cancel).await) })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        // Completion order -> submission order
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }

    /// Wait for a rate slot, then run one task
    async fn dispatch<T, F, Fut>(&self, task: F, cancel: &CancellationToken) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = self.limiter.acquire() => {}
        }

        task().await
    }
}
