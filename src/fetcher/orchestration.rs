//! Batched retrieval: plan, dispatch under the rate ceiling, aggregate

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::KeggClient;
use crate::aggregate::{
    AggregatedResult, AggregationMode, InMemoryCollection, StreamPersister, concatenate,
};
use crate::data::FetchedData;
use crate::error::{Error, Result};
use crate::planner;
use crate::request::{Operation, Request, RequestDescriptor};
use crate::scheduler::Scheduler;
use crate::types::{BatchSummary, EntryId, Event, FetchOutcome, FetchPhase};

/// Per-call options of [`KeggClient::get_all`]
#[derive(Clone, Debug, Default)]
pub struct GetAllOptions {
    /// Concatenate in memory (default) or stream to the client's store
    pub mode: AggregationMode,
    /// Entries per request; defaults to the configured batch size
    pub batch_size: Option<usize>,
    /// Stops dispatching further batches when cancelled
    pub cancel: Option<CancellationToken>,
}

impl GetAllOptions {
    /// Options streaming every batch to the client's store
    pub fn stream() -> Self {
        Self {
            mode: AggregationMode::StreamPersist,
            ..Self::default()
        }
    }

    /// Override the configured batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Observe `cancel` before each dispatch
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

impl KeggClient {
    /// Fetch every entry with `template`, split into rate-limited batches
    ///
    /// `template` supplies everything but the entries (operation, target
    /// database, get option). Entries are split into batches of at most the
    /// batch size, clamped to the per-request limit of the operation, and
    /// every request is built before anything is sent.
    ///
    /// Under the default [`FirstBatchPolicy::FailFast`](crate::config::FirstBatchPolicy::FailFast)
    /// a failure of the first batch aborts the call with its error, and
    /// nothing is returned or persisted. Failures of later batches are logged
    /// and recorded in the result's [`BatchSummary`]; the result holds every
    /// successful batch in submission order.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedDescriptor`] when the operation takes no entry list
    ///   or a batch request cannot be built
    /// - [`Error::InvalidConfiguration`] for a zero batch size, streaming
    ///   without a store, or streaming binary responses
    /// - the first batch's error under fail-fast
    /// - [`Error::ShapeMismatch`] when batches cannot be concatenated
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kegg_dl::{Config, GetAllOptions, KeggClient, RequestDescriptor};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = KeggClient::new(Config::default())?;
    ///     let genes = ["hsa:10458", "hsa:7157", "ece:Z5100"];
    ///
    ///     let result = client
    ///         .get_all(&RequestDescriptor::conv("ncbi-geneid"), genes, GetAllOptions::default())
    ///         .await?;
    ///     println!("{} failed batches", result.summary().failed_batch_count());
    ///     Ok(())
    /// }
    /// ```
    pub async fn get_all<I, E>(
        &self,
        template: &RequestDescriptor,
        entries: I,
        options: GetAllOptions,
    ) -> Result<AggregatedResult>
    where
        I: IntoIterator<Item = E>,
        E: Into<EntryId>,
    {
        self.emit_phase(FetchPhase::Planning);

        let operation = template.operation;
        if !operation.is_batchable() {
            return Err(Error::MalformedDescriptor {
                operation: operation.to_string(),
                message: "operation does not take an entry list".to_string(),
            });
        }

        let entries: Vec<EntryId> = entries.into_iter().map(Into::into).collect();
        let shape = template.shape();

        let persister = match options.mode {
            AggregationMode::Concatenate => None,
            AggregationMode::StreamPersist => {
                let store = self.store.clone().ok_or_else(|| {
                    Error::config(
                        "stream persistence requires a record store on the client",
                        "aggregation_mode",
                    )
                })?;
                Some(Arc::new(StreamPersister::new(
                    store,
                    template.storage_key(),
                    shape,
                )?))
            }
        };

        let mut batch_size = options.batch_size.unwrap_or(self.config.fetch.batch_size);
        if let Some(limit) = template.max_entries_per_request() {
            batch_size = batch_size.min(limit);
        }
        let batches = planner::plan(&entries, batch_size)?;

        let base_url = &self.config.fetch.base_url;
        let requests: Vec<Request> = batches
            .iter()
            .map(|batch| {
                template
                    .clone()
                    .with_entries(batch.entries().iter().cloned())
                    .build(base_url)
            })
            .collect::<Result<_>>()?;

        tracing::info!(
            operation = %operation,
            entries = entries.len(),
            batches = batches.len(),
            batch_size,
            shape = %shape,
            "planned batched fetch"
        );

        let scheduler = Scheduler::from_config(&self.config.fetch, self.limiter.clone())?;
        let cancel = options.cancel.unwrap_or_default();
        let schema = template.columns();

        let tasks: Vec<_> = batches
            .iter()
            .zip(requests)
            .map(|(batch, request)| {
                let index = batch.index();
                let persister = persister.clone();
                move || async move {
                    let outcome = self
                        .fetch_batch(operation, schema, &request, persister.as_deref())
                        .await;
                    match &outcome {
                        Ok((records, _)) => {
                            tracing::debug!(batch = index, records, "batch completed");
                            self.emit_event(Event::BatchCompleted {
                                index,
                                records: *records,
                            });
                        }
                        Err(e) => self.report_failure(index, e),
                    }
                    outcome.map(|(_, kept)| kept)
                }
            })
            .collect();

        let results = scheduler
            .run(tasks, &cancel, |phase| self.emit_phase(phase))
            .await?;

        self.emit_phase(FetchPhase::Aggregating);

        let mut summary = BatchSummary::default();
        let mut collected = Vec::new();
        for (batch, result) in batches.into_iter().zip(results) {
            match FetchOutcome::from_result(batch, result) {
                FetchOutcome::Success(kept) => {
                    summary.succeeded_batches += 1;
                    collected.extend(kept);
                }
                FetchOutcome::Failure(failure) => {
                    // Cancelled batches never ran, so nothing reported them yet
                    if matches!(failure.error, Error::Cancelled) {
                        self.report_failure(failure.batch.index(), &failure.error);
                    }
                    summary.failures.push(failure);
                }
            }
        }

        if !summary.is_complete() {
            tracing::warn!(
                failed = summary.failed_batch_count(),
                succeeded = summary.succeeded_batches,
                "batched fetch finished with failed batches"
            );
        }

        let result = match persister {
            Some(persister) => AggregatedResult::Persisted(persister.finish(summary).await?),
            None => AggregatedResult::InMemory(InMemoryCollection {
                data: concatenate(operation, shape, collected)?,
                summary,
            }),
        };

        self.emit_phase(FetchPhase::Done);
        Ok(result)
    }

    /// Fetch one batch and hand it to the persister, if any
    ///
    /// Returns the record count and the data when it is kept in memory.
    async fn fetch_batch(
        &self,
        operation: Operation,
        schema: &[&str],
        request: &Request,
        persister: Option<&StreamPersister>,
    ) -> Result<(usize, Option<FetchedData>)> {
        let data = self.execute(operation, schema, request).await?;
        let records = data.len();
        match persister {
            Some(persister) => {
                persister.persist(&data).await?;
                Ok((records, None))
            }
            None => Ok((records, Some(data))),
        }
    }

    fn report_failure(&self, index: usize, error: &Error) {
        tracing::warn!(batch = index, code = error.code(), error = %error, "batch failed");
        self.emit_event(Event::BatchFailed {
            index,
            code: error.code().to_string(),
            error: error.to_string(),
        });
    }
}
