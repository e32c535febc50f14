//! Combining per-batch results: in-memory concatenation or streamed persistence

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::data::FetchedData;
use crate::error::{Error, Result};
use crate::request::Operation;
use crate::store::{RecordStore, StoreChunk, StoreFormat, StoreLocation};
use crate::types::{BatchSummary, Shape};

/// How the batches of one call are consumed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Build one in-memory collection from every successful batch
    #[default]
    Concatenate,
    /// Append each successful batch to a record store as it completes
    StreamPersist,
}

/// Concatenated data of a call, with its batch summary
#[derive(Debug)]
pub struct InMemoryCollection {
    /// Records and payloads of every successful batch, in submission order
    pub data: FetchedData,
    /// Which batches succeeded and which failed
    pub summary: BatchSummary,
}

/// Where streamed data ended up
#[derive(Debug)]
pub struct PersistedHandle {
    /// Location of the key's data in the store
    pub location: StoreLocation,
    /// Store key the data was appended under
    pub key: String,
    /// Shape of the persisted data
    pub shape: Shape,
    /// Items appended (records, JSON documents or text chunks)
    pub items_written: u64,
    /// Which batches succeeded and which failed
    pub summary: BatchSummary,
}

/// Result of a batched call
#[derive(Debug)]
pub enum AggregatedResult {
    /// [`AggregationMode::Concatenate`] result
    InMemory(InMemoryCollection),
    /// [`AggregationMode::StreamPersist`] result
    Persisted(PersistedHandle),
}

impl AggregatedResult {
    /// Batch summary of either variant
    pub fn summary(&self) -> &BatchSummary {
        match self {
            AggregatedResult::InMemory(collection) => &collection.summary,
            AggregatedResult::Persisted(handle) => &handle.summary,
        }
    }

    /// The in-memory collection, if this is one
    pub fn into_in_memory(self) -> Option<InMemoryCollection> {
        match self {
            AggregatedResult::InMemory(collection) => Some(collection),
            AggregatedResult::Persisted(_) => None,
        }
    }

    /// The persisted handle, if this is one
    pub fn into_persisted(self) -> Option<PersistedHandle> {
        match self {
            AggregatedResult::Persisted(handle) => Some(handle),
            AggregatedResult::InMemory(_) => None,
        }
    }
}

/// Merge submission-ordered batches into one [`FetchedData`]
///
/// # Errors
///
/// [`Error::ShapeMismatch`] when any batch has a shape other than `shape`.
pub fn concatenate(
    operation: Operation,
    shape: Shape,
    batches: impl IntoIterator<Item = FetchedData>,
) -> Result<FetchedData> {
    let mut combined = FetchedData::empty(operation, shape);
    for batch in batches {
        combined.append(batch)?;
    }
    Ok(combined)
}

#[derive(Debug, Default)]
struct WriterState {
    started: bool,
    items_written: u64,
}

/// Appends completed batches to a [`RecordStore`] under one key
///
/// The key is truncated on the first append (or on [`finish`](Self::finish)
/// when nothing was appended), so a call aborted by its first batch leaves
/// the store untouched. Appends are serialized by a single writer lock.
pub struct StreamPersister {
    store: Arc<dyn RecordStore>,
    key: String,
    shape: Shape,
    format: StoreFormat,
    writer: Mutex<WriterState>,
}

impl std::fmt::Debug for StreamPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPersister")
            .field("key", &self.key)
            .field("shape", &self.shape)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl StreamPersister {
    /// Create a persister for data of `shape` under `key`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] for binary shapes.
    pub fn new(store: Arc<dyn RecordStore>, key: impl Into<String>, shape: Shape) -> Result<Self> {
        let format = StoreFormat::for_shape(shape).ok_or_else(|| {
            Error::config(
                format!("{shape} responses cannot be streamed to a record store"),
                "aggregation_mode",
            )
        })?;
        Ok(Self {
            store,
            key: key.into(),
            shape,
            format,
            writer: Mutex::new(WriterState::default()),
        })
    }

    /// Store key the data is appended under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append one successful batch; returns the number of items written
    pub async fn persist(&self, data: &FetchedData) -> Result<u64> {
        if data.shape() != self.shape {
            return Err(Error::ShapeMismatch {
                expected: self.shape,
                found: data.shape(),
            });
        }

        let mut writer = self.writer.lock().await;
        if !writer.started {
            self.store.truncate(&self.key).await?;
            writer.started = true;
        }

        let mut written = 0;
        match self.shape {
            Shape::Text => {
                if let Some(text) = data.text() {
                    written += self.store.append(&self.key, StoreChunk::Text(text)).await?;
                }
            }
            Shape::Json => {
                for document in data.json() {
                    written += self
                        .store
                        .append(&self.key, StoreChunk::Json(document))
                        .await?;
                }
            }
            Shape::Tabular | Shape::FlatFile | Shape::Sequence => {
                if !data.is_empty() {
                    written += self
                        .store
                        .append(&self.key, StoreChunk::Records(data.records()))
                        .await?;
                }
            }
            Shape::Binary => {}
        }
        writer.items_written += written;
        Ok(written)
    }

    /// Flush the store and describe what was persisted
    pub async fn finish(&self, summary: BatchSummary) -> Result<PersistedHandle> {
        let items_written = {
            let mut writer = self.writer.lock().await;
            if !writer.started {
                // Nothing succeeded; stale data from an earlier call must not survive
                self.store.truncate(&self.key).await?;
                writer.started = true;
            }
            writer.items_written
        };
        self.store.flush().await?;

        let location = self.store.location(&self.key, self.format);
        tracing::info!(
            key = %self.key,
            items = items_written,
            location = %location,
            "persisted batched results"
        );

        Ok(PersistedHandle {
            location,
            key: self.key.clone(),
            shape: self.shape,
            items_written,
            summary,
        })
    }
}
