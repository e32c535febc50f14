//! Fixed-label-column flat-file records (get)
//!
//! ```text
//! ENTRY       hsa:10458         CDS       T01001
//! NAME        BAIAP2, BAP2, FLAF3, IRSP53
//! PATHWAY     hsa04520  Adherens junction
//!             hsa04810  Regulation of actin cytoskeleton
//! ///
//! ```
//!
//! A line whose first [`LABEL_WIDTH`] characters are not blank starts a field;
//! lines with a blank label column continue the current one.

use crate::types::{FieldValue, Record};

/// Width of the label column, in characters
pub const LABEL_WIDTH: usize = 12;

/// Line terminating each record
pub const RECORD_TERMINATOR: &str = "///";

/// Fields kept as the full list of their lines
pub const MULTI_VALUED_FIELDS: &[&str] = &[
    "PATHWAY",
    "MODULE",
    "DISEASE",
    "DRUG",
    "DBLINKS",
    "GENE",
    "ORTHOLOGY",
    "REFERENCE",
    "COMPOUND",
    "REACTION",
];

/// Parse flat-file text into one record per non-empty block
pub fn parse_flat_file(text: &str) -> Vec<Record> {
    split_blocks(text)
        .into_iter()
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .filter_map(parse_block)
        .collect()
}

/// Split on terminator lines; the text after the last terminator is a block too
fn split_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim() == RECORD_TERMINATOR {
            blocks.push(&text[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    blocks.push(&text[start..]);
    blocks
}

fn parse_block(block: &str) -> Option<Record> {
    let mut record = Record::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in block.split('\n') {
        if line.is_empty() {
            continue;
        }

        let (label, rest) = split_label(line);
        let label = label.trim();
        let value = rest.trim();

        if !label.is_empty() {
            if let Some((field, values)) = current.take() {
                insert_field(&mut record, field, values);
            }
            let values = if value.is_empty() {
                Vec::new()
            } else {
                vec![value.to_string()]
            };
            current = Some((label.to_string(), values));
        } else if let Some((_, values)) = current.as_mut()
            && !value.is_empty()
        {
            values.push(value.to_string());
        }
    }

    if let Some((field, values)) = current {
        insert_field(&mut record, field, values);
    }

    (!record.is_empty()).then_some(record)
}

/// Split a line after its first [`LABEL_WIDTH`] characters
fn split_label(line: &str) -> (&str, &str) {
    match line.char_indices().nth(LABEL_WIDTH) {
        Some((index, _)) => line.split_at(index),
        None => (line, ""),
    }
}

/// A repeated label replaces the earlier value but keeps its position
fn insert_field(record: &mut Record, field: String, values: Vec<String>) {
    let value = if MULTI_VALUED_FIELDS.contains(&field.as_str()) {
        FieldValue::List(values)
    } else {
        FieldValue::Text(values.join("\n"))
    };
    record.insert(field, value);
}
