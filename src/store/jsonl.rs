//! File-backed record store: JSON lines, text files and a metadata index

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{RecordStore, StoreChunk, StoreFormat, StoreLocation, TEXT_SEPARATOR};
use crate::config::StorageConfig;
use crate::error::Result;

/// Metadata kept per key in `{db_name}_metadata.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Data file of the key
    pub filepath: PathBuf,
    /// Layout of the data file ("jsonl" or "text")
    pub format: String,
    /// Items appended since the key was last truncated
    pub item_count: u64,
    /// Time of the last append
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MetadataState {
    entries: BTreeMap<String, MetadataEntry>,
    dirty: bool,
}

/// [`RecordStore`] writing `{key}.jsonl` and `{key}.txt` under a directory
///
/// Metadata is held in memory and written to `{db_name}_metadata.json` on
/// [`flush`](RecordStore::flush), only when something changed.
#[derive(Debug)]
pub struct JsonLinesStore {
    storage_path: PathBuf,
    metadata_file: PathBuf,
    metadata: Mutex<MetadataState>,
}

impl JsonLinesStore {
    /// Open the store, creating its directory and loading existing metadata
    ///
    /// An unreadable metadata file is logged and replaced on the next flush.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.storage_path).await?;
        let metadata_file = config
            .storage_path
            .join(format!("{}_metadata.json", config.db_name));
        let entries = load_metadata(&metadata_file).await;

        tracing::debug!(
            path = %config.storage_path.display(),
            keys = entries.len(),
            "opened JSON lines store"
        );

        Ok(Self {
            storage_path: config.storage_path.clone(),
            metadata_file,
            metadata: Mutex::new(MetadataState {
                entries,
                dirty: false,
            }),
        })
    }

    /// Directory holding the data files
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Path of the metadata file
    pub fn metadata_file(&self) -> &Path {
        &self.metadata_file
    }

    /// Metadata of `key`, if anything was appended under it
    pub async fn metadata(&self, key: &str) -> Option<MetadataEntry> {
        self.metadata.lock().await.entries.get(key).cloned()
    }

    fn path(&self, key: &str, format: StoreFormat) -> PathBuf {
        let extension = match format {
            StoreFormat::JsonLines => "jsonl",
            StoreFormat::Text => "txt",
        };
        self.storage_path.join(format!("{key}.{extension}"))
    }

    async fn record_append(&self, key: &str, format: StoreFormat, items: u64) {
        let filepath = self.path(key, format);
        let mut state = self.metadata.lock().await;
        let entry = state
            .entries
            .entry(key.to_string())
            .or_insert_with(|| MetadataEntry {
                filepath: filepath.clone(),
                format: format.as_str().to_string(),
                item_count: 0,
                timestamp: Utc::now(),
            });
        entry.filepath = filepath;
        entry.format = format.as_str().to_string();
        entry.item_count += items;
        entry.timestamp = Utc::now();
        state.dirty = true;
    }
}

async fn load_metadata(path: &Path) -> BTreeMap<String, MetadataEntry> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read store metadata");
            return BTreeMap::new();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "failed to parse store metadata");
        BTreeMap::new()
    })
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl RecordStore for JsonLinesStore {
    async fn truncate(&self, key: &str) -> Result<()> {
        remove_if_exists(&self.path(key, StoreFormat::JsonLines)).await?;
        remove_if_exists(&self.path(key, StoreFormat::Text)).await?;

        let mut state = self.metadata.lock().await;
        if state.entries.remove(key).is_some() {
            state.dirty = true;
        }
        Ok(())
    }

    async fn append(&self, key: &str, chunk: StoreChunk<'_>) -> Result<u64> {
        let format = chunk.format();
        let mut buffer = String::new();
        match chunk {
            StoreChunk::Records(records) => {
                for record in records {
                    buffer.push_str(&serde_json::to_string(record)?);
                    buffer.push('\n');
                }
            }
            StoreChunk::Json(value) => {
                buffer.push_str(&serde_json::to_string(value)?);
                buffer.push('\n');
            }
            StoreChunk::Text(text) => {
                buffer.push_str(text);
                buffer.push_str(TEXT_SEPARATOR);
            }
        }

        let path = self.path(key, format);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;

        let items = chunk.item_count();
        self.record_append(key, format, items).await;
        tracing::debug!(key, items, path = %path.display(), "appended to store");
        Ok(items)
    }

    async fn flush(&self) -> Result<()> {
        let mut state = self.metadata.lock().await;
        if !state.dirty {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&state.entries)?;
        tokio::fs::write(&self.metadata_file, json).await?;
        state.dirty = false;
        Ok(())
    }

    async fn read_values(&self, key: &str) -> Result<Vec<Value>> {
        let path = self.path(key, StoreFormat::JsonLines);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }

    async fn read_text(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(key, StoreFormat::Text)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self, key: &str, format: StoreFormat) -> StoreLocation {
        StoreLocation::File {
            path: self.path(key, format),
        }
    }
}
