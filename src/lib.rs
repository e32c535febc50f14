//! # kegg-dl
//!
//! Batched, rate-limited retrieval from the KEGG REST API with response
//! normalization.
//!
//! ## Design Philosophy
//!
//! kegg-dl is designed to be:
//! - **Polite** - One rate ceiling shared by every request, whatever the concurrency
//! - **Partial-failure tolerant** - Failed batches are reported, successful ones kept
//! - **Shape-aware** - Tabular, flat-file, sequence, JSON, binary and text
//!   responses normalize into one record model
//! - **Library-first** - No CLI or UI; consumers subscribe to events
//!
//! ## Quick Start
//!
//! ```no_run
//! use kegg_dl::{Config, GetAllOptions, KeggClient, Operation, RequestDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KeggClient::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let genes: Vec<String> = (1..=25).map(|i| format!("hsa:{i}")).collect();
//!     let template = RequestDescriptor::new(Operation::Get);
//!     let result = client.get_all(&template, genes, GetAllOptions::default()).await?;
//!
//!     if let Some(collection) = result.into_in_memory() {
//!         println!("{} records", collection.data.len());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Concatenation and streamed persistence of batch results
pub mod aggregate;
/// Configuration types
pub mod config;
/// Normalized result collections
pub mod data;
/// Error types
pub mod error;
/// KEGG client and batched orchestration
pub mod fetcher;
/// Response normalization per wire shape
pub mod normalize;
/// Splitting entry lists into batches
pub mod planner;
/// Request-rate ceiling shared across workers
pub mod rate_limiter;
/// Request descriptors and URL construction
pub mod request;
/// Rate-limited, bounded-concurrency batch execution
pub mod scheduler;
/// Record stores for streamed results
pub mod store;
/// Network transport
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use aggregate::{AggregatedResult, AggregationMode, InMemoryCollection, PersistedHandle};
pub use config::{Config, FetchConfig, FirstBatchPolicy, StorageConfig};
pub use data::FetchedData;
pub use error::{DatabaseError, Error, ParseError, Result, TransportError};
pub use fetcher::{GetAllOptions, KeggClient};
pub use rate_limiter::RateLimiter;
pub use request::{GetOption, Operation, RdfOption, RequestDescriptor};
pub use store::{JsonLinesStore, RecordStore, SqliteStore, StoreLocation};
pub use transport::{RawResponse, ReqwestTransport, Transport};
pub use types::{
    Batch, BatchFailure, BatchSummary, EntryId, Event, FetchPhase, FieldValue, Record, Shape,
};
