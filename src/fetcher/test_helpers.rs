//! Scripted transport for orchestration tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::config::{Config, FetchConfig};
use crate::error::TransportError;
use crate::fetcher::KeggClient;
use crate::request::Request;
use crate::transport::{RawResponse, Transport};

type Responder = dyn Fn(&Request) -> Result<RawResponse, TransportError> + Send + Sync;
type Latency = dyn Fn(&Request) -> Duration + Send + Sync;

/// One request seen by [`MockTransport`]
#[derive(Clone, Debug)]
pub(crate) struct Dispatch {
    pub(crate) at: Instant,
    pub(crate) url: String,
}

/// Transport answering from a closure and recording every request
pub(crate) struct MockTransport {
    responder: Box<Responder>,
    latency: Box<Latency>,
    dispatches: Mutex<Vec<Dispatch>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTransport {
    pub(crate) fn new(
        responder: impl Fn(&Request) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            latency: Box::new(|_| Duration::ZERO),
            dispatches: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answer every request after `latency`
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Box::new(move |_| latency);
        self
    }

    /// Answer each request after a latency chosen per request
    pub(crate) fn with_latency_by(
        mut self,
        latency: impl Fn(&Request) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.latency = Box::new(latency);
        self
    }

    pub(crate) fn dispatches(&self) -> Vec<Dispatch> {
        self.dispatches.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.dispatches.lock().unwrap().len()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &Request) -> Result<RawResponse, TransportError> {
        self.dispatches.lock().unwrap().push(Dispatch {
            at: Instant::now(),
            url: request.url.to_string(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let latency = (self.latency)(request);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.responder)(request)
    }
}

/// Entries named in the request path, e.g. `["hsa:1", "hsa:2"]` for
/// `/conv/ncbi-geneid/hsa:1+hsa:2`
pub(crate) fn requested_entries(request: &Request, segment: usize) -> Vec<String> {
    request
        .url
        .path_segments()
        .and_then(|mut segments| segments.nth(segment))
        .map(|entries| entries.split('+').map(str::to_string).collect())
        .unwrap_or_default()
}

/// Answers conv requests with one `entry<TAB>ncbi-geneid:entry` row per entry
pub(crate) fn conv_body(request: &Request) -> RawResponse {
    let body: String = requested_entries(request, 2)
        .iter()
        .map(|entry| format!("{entry}\tncbi-geneid:{entry}\n"))
        .collect();
    RawResponse::ok(body)
}

/// Whether the request's entry list starts with `entry`
pub(crate) fn batch_starts_with(request: &Request, segment: usize, entry: &str) -> bool {
    requested_entries(request, segment)
        .first()
        .is_some_and(|first| first == entry)
}

pub(crate) fn entries(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("hsa:{i}")).collect()
}

pub(crate) fn server_error() -> Result<RawResponse, TransportError> {
    Ok(RawResponse {
        status: 500,
        body: b"Internal Server Error".to_vec(),
    })
}

pub(crate) fn test_config(rate: u32, concurrency: usize) -> Config {
    Config {
        fetch: FetchConfig {
            base_url: "https://rest.kegg.test".to_string(),
            rate_limit_per_second: rate,
            max_concurrency: concurrency,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Client over `transport`, returning the transport for inspection
pub(crate) fn client_with(config: Config, transport: MockTransport) -> (KeggClient, Arc<MockTransport>) {
    let transport = Arc::new(transport);
    let client = KeggClient::with_transport(config, transport.clone()).unwrap();
    (client, transport)
}
