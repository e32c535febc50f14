//! Core types for kegg-dl

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Error;

/// Opaque identifier of one record in the remote database (e.g. `hsa:10458`)
///
/// The grammar of identifiers is not checked; they are passed through verbatim.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Create a new EntryId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for EntryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable, ordered slice of entries dispatched as one request
///
/// Created once by [`plan`](crate::planner::plan) and never mutated. Cloning
/// is cheap (shared storage).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    index: usize,
    entries: Arc<[EntryId]>,
}

impl Batch {
    pub(crate) fn new(index: usize, entries: Vec<EntryId>) -> Self {
        Self {
            index,
            entries: entries.into(),
        }
    }

    /// Zero-based position of this batch in the plan
    pub fn index(&self) -> usize {
        self.index
    }

    /// Entries of this batch, in input order
    pub fn entries(&self) -> &[EntryId] {
        &self.entries
    }

    /// Number of entries in this batch
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch has no entries (never true for planned batches)
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Structural encoding of a response body
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Tab-separated rows (list, find, conv, link, ddi)
    Tabular,
    /// Fixed-label-column records terminated by `///` lines
    FlatFile,
    /// `>`-delimited sequence blocks (FASTA)
    Sequence,
    /// JSON document
    Json,
    /// Opaque bytes (images)
    Binary,
    /// Plain text kept verbatim (info, mol, kcf, kgml, RDF)
    Text,
}

impl Shape {
    /// Get the string representation of this shape
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Tabular => "tabular",
            Shape::FlatFile => "flat_file",
            Shape::Sequence => "sequence",
            Shape::Json => "json",
            Shape::Binary => "binary",
            Shape::Text => "text",
        }
    }

    /// Whether the body must be decoded as UTF-8 text
    pub fn is_textual(&self) -> bool {
        !matches!(self, Shape::Json | Shape::Binary)
    }

    /// Whether bodies of this shape are parsed into records
    pub fn has_records(&self) -> bool {
        matches!(self, Shape::Tabular | Shape::FlatFile | Shape::Sequence)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of one field of a normalized record
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Missing value (short tabular rows)
    Null,
    /// Single string value
    Text(String),
    /// Ordered list of values (multi-valued flat-file fields, tabular extras)
    List(Vec<String>),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// The string value, if this is a single string
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The list value, if this is a list
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(values) => Some(values),
            _ => None,
        }
    }

    /// Whether this is the missing value
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::List(values)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => f.write_str("None"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(values) => write!(f, "[{}]", values.join(", ")),
            FieldValue::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// Normalized record: field name -> value, in parse order
pub type Record = IndexMap<String, FieldValue>;

/// Per-call orchestration phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPhase {
    /// Validating inputs, building requests, splitting batches
    Planning,
    /// Fetching the first batch alone
    FirstBatchFetch,
    /// First batch failed; the call is aborted
    Aborted,
    /// First batch succeeded
    FirstBatchOk,
    /// Fetching the remaining batches concurrently
    ConcurrentFetchRemaining,
    /// Combining or flushing results
    Aggregating,
    /// Call finished
    Done,
}

/// Event emitted while an orchestration call runs
///
/// Consumers subscribe via [`KeggClient::subscribe`](crate::KeggClient::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The call moved to a new phase
    PhaseChanged {
        /// New phase
        phase: FetchPhase,
    },
    /// A batch was fetched and normalized
    BatchCompleted {
        /// Batch position in the plan
        index: usize,
        /// Records produced by the batch
        records: usize,
    },
    /// A batch failed
    BatchFailed {
        /// Batch position in the plan
        index: usize,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },
}

/// A batch that did not produce data, with the reason
#[derive(Debug)]
pub struct BatchFailure {
    /// The batch that failed
    pub batch: Batch,
    /// Why it failed
    pub error: Error,
}

/// Outcome of one batch
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// The batch was fetched and normalized
    Success(T),
    /// The batch failed; the error is kept with the batch
    Failure(BatchFailure),
}

impl<T> FetchOutcome<T> {
    /// Pair a scheduler result with the batch it belongs to
    pub fn from_result(batch: Batch, result: crate::Result<T>) -> Self {
        match result {
            Ok(value) => FetchOutcome::Success(value),
            Err(error) => FetchOutcome::Failure(BatchFailure { batch, error }),
        }
    }

    /// Whether the batch succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

/// Success/failure counts of an orchestration call
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Number of batches that produced data
    pub succeeded_batches: usize,
    /// Failed batches, in submission order
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    /// Number of batches omitted from the result
    pub fn failed_batch_count(&self) -> usize {
        self.failures.len()
    }

    /// Entries of all failed batches, in submission order
    pub fn failed_entries(&self) -> Vec<EntryId> {
        self.failures
            .iter()
            .flat_map(|f| f.batch.entries().iter().cloned())
            .collect()
    }

    /// Whether every batch succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
