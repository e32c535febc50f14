//! Fetched data: the normalized result of one or more responses

use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::normalize::{Normalized, RawPayload};
use crate::request::Operation;
use crate::types::{FieldValue, Record, Shape};

/// Normalized data of one operation, from one batch or concatenated batches
///
/// Records keep response order. Flat-file, sequence and text responses also
/// keep their original text; JSON and binary responses keep their payloads.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedData {
    operation: Operation,
    shape: Shape,
    records: Vec<Record>,
    text: Option<String>,
    payloads: Vec<RawPayload>,
}

impl FetchedData {
    /// Empty data of the given operation and shape
    pub fn empty(operation: Operation, shape: Shape) -> Self {
        Self {
            operation,
            shape,
            records: Vec::new(),
            text: None,
            payloads: Vec::new(),
        }
    }

    /// Wrap a normalized response
    pub fn from_normalized(operation: Operation, normalized: Normalized) -> Self {
        let mut data = Self::empty(operation, normalized.shape);
        data.records = normalized.records;
        match normalized.payload {
            Some(RawPayload::Text(text)) => data.text = Some(text),
            Some(payload) => data.payloads.push(payload),
            None => {}
        }
        data
    }

    /// Operation that produced the data
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Declared shape of the responses
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Normalized records, in submission and parse order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Take the records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Original text of flat-file, sequence and text responses
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// JSON and binary payloads, in submission order
    pub fn payloads(&self) -> &[RawPayload] {
        &self.payloads
    }

    /// Parsed JSON documents, in submission order
    pub fn json(&self) -> impl Iterator<Item = &Value> {
        self.payloads.iter().filter_map(RawPayload::as_json)
    }

    /// First binary payload (image responses carry one entry each)
    pub fn binary(&self) -> Option<&[u8]> {
        self.payloads.iter().find_map(RawPayload::as_bytes)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted field names over all records, or the operation's columns when
    /// there are none
    pub fn columns(&self) -> Vec<String> {
        if self.records.is_empty() {
            return self
                .operation
                .columns()
                .iter()
                .map(|c| (*c).to_string())
                .collect();
        }
        let mut columns: Vec<String> = self
            .records
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect();
        columns.sort();
        columns.dedup();
        columns
    }

    /// Records restricted to `columns`, in that order; absent fields are `Null`
    pub fn project(&self, columns: &[&str]) -> Vec<Record> {
        self.records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| {
                        let value = record.get(*c).cloned().unwrap_or(FieldValue::Null);
                        ((*c).to_string(), value)
                    })
                    .collect()
            })
            .collect()
    }

    /// Copy keeping only records matching `predicate`
    pub fn filter(&self, predicate: impl Fn(&Record) -> bool) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect(),
            ..self.clone_without_records()
        }
    }

    /// Copy keeping only records whose `field` equals `value`
    ///
    /// Records without the field never match.
    pub fn filter_eq(&self, field: &str, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        self.filter(|record| record.get(field) == Some(&value))
    }

    /// First record whose `entry_id` is `id` or whose `ENTRY` starts with `id`
    pub fn entry(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|record| {
            record.get("entry_id").and_then(FieldValue::as_text) == Some(id)
                || record
                    .get("ENTRY")
                    .and_then(FieldValue::as_text)
                    .is_some_and(|entry| entry.starts_with(id))
        })
    }

    /// Raw text, or tab-separated rows rebuilt from tabular records
    pub fn to_text(&self) -> Option<String> {
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            return Some(text.to_string());
        }
        if self.shape != Shape::Tabular {
            return None;
        }
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&tabular_line(record));
            out.push('\n');
        }
        Some(out)
    }

    /// Write [`to_text`](Self::to_text) to `path`; returns whether anything was written
    pub async fn save_text(&self, path: &Path) -> Result<bool> {
        let Some(text) = self.to_text() else {
            return Ok(false);
        };
        tokio::fs::write(path, text).await?;
        Ok(true)
    }

    /// Write the first binary payload to `path`; returns whether anything was written
    pub async fn save_binary(&self, path: &Path) -> Result<bool> {
        let Some(bytes) = self.binary() else {
            return Ok(false);
        };
        tokio::fs::write(path, bytes).await?;
        Ok(true)
    }

    /// Append another batch of the same shape
    ///
    /// Records are appended in order, texts joined with a newline and
    /// payloads appended.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] when the shapes differ; `self` is unchanged.
    pub fn append(&mut self, other: FetchedData) -> Result<()> {
        if other.shape != self.shape {
            return Err(Error::ShapeMismatch {
                expected: self.shape,
                found: other.shape,
            });
        }

        self.records.extend(other.records);
        self.payloads.extend(other.payloads);
        self.text = match (self.text.take(), other.text) {
            (Some(mut mine), Some(theirs)) if !mine.is_empty() && !theirs.is_empty() => {
                mine.push('\n');
                mine.push_str(&theirs);
                Some(mine)
            }
            (Some(mine), Some(theirs)) if mine.is_empty() => Some(theirs),
            (Some(mine), _) => Some(mine),
            (None, theirs) => theirs,
        };
        Ok(())
    }

    fn clone_without_records(&self) -> Self {
        Self {
            operation: self.operation,
            shape: self.shape,
            records: Vec::new(),
            text: self.text.clone(),
            payloads: self.payloads.clone(),
        }
    }
}

/// One tab-separated row: list values spread into their own fields,
/// trailing `Null`s dropped and inner ones left empty
fn tabular_line(record: &Record) -> String {
    let mut fields: Vec<Option<&str>> = Vec::with_capacity(record.len());
    for value in record.values() {
        match value {
            FieldValue::Text(text) => fields.push(Some(text)),
            FieldValue::List(values) => fields.extend(values.iter().map(|v| Some(v.as_str()))),
            FieldValue::Null | FieldValue::Bytes(_) => fields.push(None),
        }
    }
    while matches!(fields.last(), Some(None)) {
        fields.pop();
    }
    fields
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect::<Vec<_>>()
        .join("\t")
}
