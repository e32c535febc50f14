//! Record stores for streamed results
//!
//! A [`RecordStore`] accepts incremental appends under a key and reports
//! where the data lives. Two implementations are provided:
//! - [`JsonLinesStore`]: one `{key}.jsonl` / `{key}.txt` file per key plus a
//!   JSON metadata file
//! - [`SqliteStore`]: one SQLite database, rows tagged by key

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::{Record, Shape};

mod jsonl;
mod sqlite;

pub use jsonl::{JsonLinesStore, MetadataEntry};
pub use sqlite::SqliteStore;

/// Separator written after each text chunk
pub const TEXT_SEPARATOR: &str = "\n///\n";

/// How a key's data is laid out in a store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFormat {
    /// One JSON object per record (or JSON document) per line
    JsonLines,
    /// Raw text chunks separated by [`TEXT_SEPARATOR`]
    Text,
}

impl StoreFormat {
    /// Format used to persist data of `shape`; binary data cannot be persisted
    pub fn for_shape(shape: Shape) -> Option<Self> {
        match shape {
            Shape::Tabular | Shape::FlatFile | Shape::Sequence | Shape::Json => {
                Some(StoreFormat::JsonLines)
            }
            Shape::Text => Some(StoreFormat::Text),
            Shape::Binary => None,
        }
    }

    /// Short name used in metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreFormat::JsonLines => "jsonl",
            StoreFormat::Text => "text",
        }
    }
}

/// One unit of appended data
#[derive(Clone, Copy, Debug)]
pub enum StoreChunk<'a> {
    /// Normalized records
    Records(&'a [Record]),
    /// Raw text
    Text(&'a str),
    /// A JSON document
    Json(&'a Value),
}

impl StoreChunk<'_> {
    /// Number of items the chunk contributes to a key's count
    pub fn item_count(&self) -> u64 {
        match self {
            StoreChunk::Records(records) => records.len() as u64,
            StoreChunk::Text(_) | StoreChunk::Json(_) => 1,
        }
    }

    /// Layout the chunk is written in
    pub fn format(&self) -> StoreFormat {
        match self {
            StoreChunk::Records(_) | StoreChunk::Json(_) => StoreFormat::JsonLines,
            StoreChunk::Text(_) => StoreFormat::Text,
        }
    }
}

/// Where a key's data lives
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreLocation {
    /// A file on disk
    File {
        /// File path
        path: PathBuf,
    },
    /// Rows of a database table
    Table {
        /// Database file
        database: PathBuf,
        /// Key the rows are tagged with
        key: String,
    },
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::File { path } => write!(f, "{}", path.display()),
            StoreLocation::Table { database, key } => {
                write!(f, "{}#{}", database.display(), key)
            }
        }
    }
}

/// Durable, append-only destination for streamed batches
///
/// Callers serialize appends; implementations do not need to handle
/// concurrent appends to the same key.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Discard any data stored under `key`
    async fn truncate(&self, key: &str) -> Result<()>;

    /// Append `chunk` under `key`; returns the number of items written
    async fn append(&self, key: &str, chunk: StoreChunk<'_>) -> Result<u64>;

    /// Make appended data and metadata durable
    async fn flush(&self) -> Result<()>;

    /// Read back the JSON lines stored under `key`, in append order
    async fn read_values(&self, key: &str) -> Result<Vec<Value>>;

    /// Read back records stored under `key`, in append order
    async fn read_records(&self, key: &str) -> Result<Vec<Record>> {
        self.read_values(key)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    /// Read back text stored under `key`, separators included
    async fn read_text(&self, key: &str) -> Result<Option<String>>;

    /// Location of `key`'s data in `format`
    fn location(&self, key: &str, format: StoreFormat) -> StoreLocation;
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_has_no_store_format() {
        assert_eq!(StoreFormat::for_shape(Shape::Binary), None);
        assert_eq!(
            StoreFormat::for_shape(Shape::FlatFile),
            Some(StoreFormat::JsonLines)
        );
        assert_eq!(StoreFormat::for_shape(Shape::Text), Some(StoreFormat::Text));
    }

    #[test]
    fn chunk_counts() {
        let records = vec![Record::new(), Record::new()];
        assert_eq!(StoreChunk::Records(&records).item_count(), 2);
        assert_eq!(StoreChunk::Text("x").item_count(), 1);
        assert_eq!(StoreChunk::Text("x").format(), StoreFormat::Text);
    }

    #[test]
    fn location_display() {
        let file = StoreLocation::File {
            path: PathBuf::from("/data/kegg_get.jsonl"),
        };
        assert_eq!(file.to_string(), "/data/kegg_get.jsonl");

        let table = StoreLocation::Table {
            database: PathBuf::from("/data/kegg.db"),
            key: "kegg_conv".into(),
        };
        assert_eq!(table.to_string(), "/data/kegg.db#kegg_conv");
    }
}
