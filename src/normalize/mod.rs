//! Response normalization
//!
//! Turns a raw response body into uniform [`Record`]s according to its
//! declared [`Shape`]:
//!
//! | Shape       | Records                                   | Payload kept        |
//! |-------------|-------------------------------------------|---------------------|
//! | `Tabular`   | one per non-blank tab-separated row       | none                |
//! | `FlatFile`  | one per `///`-terminated block            | original text       |
//! | `Sequence`  | one per `>` block (`entry_id`, `description`, `sequence`) | original text |
//! | `Json`      | none                                      | parsed document     |
//! | `Binary`    | none                                      | body bytes          |
//! | `Text`      | none                                      | original text       |
//!
//! Textual shapes require the body to be valid UTF-8; no lossy decoding is
//! applied.

mod flat_file;
mod sequence;
mod tabular;

pub use flat_file::{LABEL_WIDTH, MULTI_VALUED_FIELDS, RECORD_TERMINATOR, parse_flat_file};
pub use sequence::{SEQUENCE_MARKER, parse_sequences};
pub use tabular::{COLUMN_DELIMITER, EXTRA_FIELD, parse_tabular};

use serde_json::Value;

use crate::error::ParseError;
use crate::types::{Record, Shape};

/// Unparsed (or not record-shaped) part of a response
#[derive(Clone, Debug, PartialEq)]
pub enum RawPayload {
    /// Parsed JSON document
    Json(Value),
    /// Opaque bytes
    Binary(Vec<u8>),
    /// Verbatim text
    Text(String),
}

impl RawPayload {
    /// The text, if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The bytes, if this is a binary payload
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RawPayload::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The document, if this is a JSON payload
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RawPayload::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Result of normalizing one response body
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized {
    /// Shape the body was parsed as
    pub shape: Shape,
    /// Parsed records, in body order (empty for passthrough shapes)
    pub records: Vec<Record>,
    /// Passthrough payload, or the original text of flat-file and sequence bodies
    pub payload: Option<RawPayload>,
}

/// Normalize `body` according to `shape`
///
/// `schema` names the columns of tabular rows; other shapes ignore it.
pub fn normalize(body: &[u8], shape: Shape, schema: &[&str]) -> Result<Normalized, ParseError> {
    let (records, payload) = match shape {
        Shape::Tabular => (parse_tabular(decode(body, shape)?, schema), None),
        Shape::FlatFile => {
            let text = decode(body, shape)?;
            (parse_flat_file(text), Some(RawPayload::Text(text.to_string())))
        }
        Shape::Sequence => {
            let text = decode(body, shape)?;
            (parse_sequences(text), Some(RawPayload::Text(text.to_string())))
        }
        Shape::Json => {
            let value: Value = serde_json::from_slice(body).map_err(ParseError::InvalidJson)?;
            (Vec::new(), Some(RawPayload::Json(value)))
        }
        Shape::Binary => (Vec::new(), Some(RawPayload::Binary(body.to_vec()))),
        Shape::Text => (
            Vec::new(),
            Some(RawPayload::Text(decode(body, shape)?.to_string())),
        ),
    };

    tracing::trace!(
        shape = %shape,
        bytes = body.len(),
        records = records.len(),
        "normalized response body"
    );

    Ok(Normalized {
        shape,
        records,
        payload,
    })
}

/// Strict UTF-8 decoding for textual shapes
fn decode(body: &[u8], shape: Shape) -> Result<&str, ParseError> {
    std::str::from_utf8(body).map_err(|e| ParseError::InvalidUtf8 {
        shape,
        valid_up_to: e.valid_up_to(),
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldValue;

    #[test]
    fn tabular_body_becomes_records_without_payload() {
        let normalized = normalize(b"A\tB\n\nC\tD\n", Shape::Tabular, &["col1", "col2"]).unwrap();
        assert_eq!(normalized.records.len(), 2);
        assert_eq!(normalized.records[1]["col1"], FieldValue::from("C"));
        assert!(normalized.payload.is_none());
    }

    #[test]
    fn flat_file_keeps_original_text() {
        let body = "ENTRY       C00001\nNAME        H2O\n///\n";
        let normalized = normalize(body.as_bytes(), Shape::FlatFile, &[]).unwrap();
        assert_eq!(normalized.records.len(), 1);
        assert_eq!(
            normalized.payload.as_ref().and_then(RawPayload::as_text),
            Some(body)
        );
    }

    #[test]
    fn json_is_parsed() {
        let normalized = normalize(br#"{"name":"ko00001"}"#, Shape::Json, &[]).unwrap();
        let value = normalized.payload.as_ref().and_then(RawPayload::as_json).unwrap();
        assert_eq!(value["name"], "ko00001");
        assert!(normalized.records.is_empty());
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = normalize(b"{\"name\":", Shape::Json, &[]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn binary_passes_through_untouched() {
        let png = [0x89, b'P', b'N', b'G', 0x00, 0xff];
        let normalized = normalize(&png, Shape::Binary, &[]).unwrap();
        assert_eq!(
            normalized.payload.as_ref().and_then(RawPayload::as_bytes),
            Some(&png[..])
        );
    }

    #[test]
    fn text_is_kept_verbatim() {
        let body = "kegg             Kyoto Encyclopedia of Genes and Genomes\n";
        let normalized = normalize(body.as_bytes(), Shape::Text, &[]).unwrap();
        assert_eq!(normalized.payload, Some(RawPayload::Text(body.to_string())));
    }

    #[test]
    fn textual_shapes_reject_invalid_utf8() {
        for shape in [Shape::Tabular, Shape::FlatFile, Shape::Sequence, Shape::Text] {
            match normalize(b"ok\xff\xfe", shape, &["a"]) {
                Err(ParseError::InvalidUtf8 {
                    shape: reported,
                    valid_up_to,
                }) => {
                    assert_eq!(reported, shape);
                    assert_eq!(valid_up_to, 2);
                }
                other => panic!("expected InvalidUtf8 for {shape}, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_bodies_yield_no_records() {
        for shape in [Shape::Tabular, Shape::FlatFile, Shape::Sequence] {
            let normalized = normalize(b"", shape, &["a", "b"]).unwrap();
            assert!(normalized.records.is_empty(), "{shape}");
        }
    }
}
