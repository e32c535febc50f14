//! Tab-separated rows (list, find, conv, link, ddi)

use crate::types::{FieldValue, Record};

/// Column delimiter of tabular bodies
pub const COLUMN_DELIMITER: char = '\t';

/// Field collecting values beyond the named columns
pub const EXTRA_FIELD: &str = "extra";

/// Columns used when an operation declares no schema
const FALLBACK_COLUMNS: &[&str] = &["col1", "col2"];

/// Parse tab-separated rows into records keyed by `schema`
///
/// Blank lines are skipped. Missing trailing columns are [`FieldValue::Null`];
/// values beyond the schema are collected into an [`EXTRA_FIELD`] list.
/// Values are not trimmed.
pub fn parse_tabular(text: &str, schema: &[&str]) -> Vec<Record> {
    let columns = if schema.is_empty() {
        FALLBACK_COLUMNS
    } else {
        schema
    };

    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_row(line, columns))
        .collect()
}

fn parse_row(line: &str, columns: &[&str]) -> Record {
    let parts: Vec<&str> = line.split(COLUMN_DELIMITER).collect();
    let mut record = Record::with_capacity(columns.len() + 1);

    for (i, column) in columns.iter().enumerate() {
        let value = parts
            .get(i)
            .map(|v| FieldValue::Text((*v).to_string()))
            .unwrap_or(FieldValue::Null);
        record.insert((*column).to_string(), value);
    }

    if parts.len() > columns.len() {
        let extra = parts[columns.len()..]
            .iter()
            .map(|v| (*v).to_string())
            .collect();
        record.insert(EXTRA_FIELD.to_string(), FieldValue::List(extra));
    }

    record
}
