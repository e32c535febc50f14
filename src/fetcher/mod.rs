//! KEGG client: single requests and batched orchestration
//!
//! [`KeggClient`] owns everything a call needs and is cheap to clone:
//! - the [`Transport`] performing network calls
//! - the [`RateLimiter`] every request passes through
//! - an optional [`RecordStore`] for [`AggregationMode::StreamPersist`](crate::aggregate::AggregationMode::StreamPersist)
//! - the event channel observed via [`KeggClient::subscribe`]
//!
//! Batched calls live in [`orchestration`].

mod orchestration;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use orchestration::GetAllOptions;

use std::sync::Arc;

use crate::config::Config;
use crate::data::FetchedData;
use crate::error::{Result, TransportError};
use crate::normalize::normalize;
use crate::rate_limiter::RateLimiter;
use crate::request::{Operation, Request, RequestDescriptor};
use crate::store::RecordStore;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{Event, FetchPhase};

/// Capacity of the event channel; slower subscribers see `RecvError::Lagged`
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Client for the KEGG REST API (cloneable; all fields are shared)
#[derive(Clone)]
pub struct KeggClient {
    pub(crate) config: Arc<Config>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) limiter: RateLimiter,
    pub(crate) store: Option<Arc<dyn RecordStore>>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl std::fmt::Debug for KeggClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeggClient")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .field("has_store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl KeggClient {
    /// Create a client talking HTTP to `config.base_url`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`](crate::Error::InvalidConfiguration) for
    /// an invalid config, or an I/O error when the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kegg_dl::{Config, KeggClient, RequestDescriptor};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = KeggClient::new(Config::default())?;
    ///     let release = client.get(&RequestDescriptor::info("kegg")).await?;
    ///     println!("{}", release.text().unwrap_or_default());
    ///     Ok(())
    /// }
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config.fetch)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client sending requests through `transport`
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let limiter = RateLimiter::new(config.fetch.rate_limit_per_second);
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::debug!(
            base_url = %config.fetch.base_url,
            rate = config.fetch.rate_limit_per_second,
            concurrency = config.fetch.max_concurrency,
            "created KEGG client"
        );

        Ok(Self {
            config: Arc::new(config),
            transport,
            limiter,
            store: None,
            event_tx,
        })
    }

    /// Attach the store used for streamed results
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share `limiter` with other clients so they stay under one ceiling
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Rate limiter shared by every request of this client
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Attached record store, if any
    pub fn store(&self) -> Option<&Arc<dyn RecordStore>> {
        self.store.as_ref()
    }

    /// Subscribe to orchestration events
    ///
    /// Every subscriber receives every event emitted after it subscribed.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Send one request built from `descriptor` and normalize the response
    ///
    /// The request waits for a rate slot like every batch does. Use
    /// [`get_all`](Self::get_all) for entry lists longer than one request allows.
    pub async fn get(&self, descriptor: &RequestDescriptor) -> Result<FetchedData> {
        let request = descriptor.build(&self.config.fetch.base_url)?;
        self.limiter.acquire().await;
        self.execute(descriptor.operation, descriptor.columns(), &request)
            .await
    }

    /// Send `request` under the configured timeout and normalize its body
    pub(crate) async fn execute(
        &self,
        operation: Operation,
        schema: &[&str],
        request: &Request,
    ) -> Result<FetchedData> {
        let timeout = self.config.fetch.request_timeout;
        tracing::debug!(url = %request.url, shape = %request.shape, "dispatching request");

        let response = tokio::time::timeout(timeout, self.transport.send(request))
            .await
            .map_err(|_| TransportError::Timeout {
                url: request.url.to_string(),
                after: timeout,
            })??;
        let body = response.into_success_body(request)?;
        let normalized = normalize(&body, request.shape, schema)?;

        Ok(FetchedData::from_normalized(operation, normalized))
    }

    /// Emit an event to all subscribers; dropped when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Log and broadcast a phase transition
    pub(crate) fn emit_phase(&self, phase: FetchPhase) {
        if phase == FetchPhase::Aborted {
            tracing::error!(phase = ?phase, "batched fetch aborted");
        } else {
            tracing::info!(phase = ?phase, "batched fetch phase");
        }
        self.emit_event(Event::PhaseChanged { phase });
    }
}
