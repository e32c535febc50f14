//! `>`-delimited sequence blocks (get with aaseq/ntseq)

use crate::types::{FieldValue, Record};

/// Marker starting each sequence block
pub const SEQUENCE_MARKER: char = '>';

/// Parse sequence blocks into `entry_id`/`description`/`sequence` records
///
/// The header is split on its first whitespace run; the remaining lines are
/// concatenated without separators.
pub fn parse_sequences(text: &str) -> Vec<Record> {
    let text = text.strip_prefix(SEQUENCE_MARKER).unwrap_or(text);

    text.split("\n>")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(parse_block)
        .collect()
}

fn parse_block(chunk: &str) -> Record {
    let mut lines = chunk.split('\n');
    let header = lines.next().unwrap_or_default();
    let sequence: String = lines.map(str::trim_end).collect();

    let (entry_id, description) = match header.split_once(char::is_whitespace) {
        Some((id, rest)) => (id, rest.trim_start()),
        None => (header, ""),
    };

    let mut record = Record::with_capacity(3);
    record.insert("entry_id".to_string(), FieldValue::from(entry_id));
    record.insert("description".to_string(), FieldValue::from(description));
    record.insert("sequence".to_string(), FieldValue::from(sequence));
    record
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const FASTA: &str = "\
>hsa:10458 K05627 BAI1-associated protein 2 | (RefSeq) BAIAP2
MSLSRSEEMHRLTENVYKTIMEQFNPSLRNFIAMGKNYEKALAGVTYAAKGYFDALVKMG
ELASESQGSKELGDVLFQMAEVHRQIQNQLEEMLKSFHNELLTQLEQKVELDSRYLSAAL
>ece:Z5100 espF; proline-rich protein
MLNGISNAASTLGRQLVGIASRVSSAGGTGFSVAPQAVRLTPVKVHSPFSPGSSNVNART
";

    #[test]
    fn header_splits_into_id_and_description() {
        let records = parse_sequences(FASTA);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["entry_id"], FieldValue::from("hsa:10458"));
        assert_eq!(
            records[0]["description"],
            FieldValue::from("K05627 BAI1-associated protein 2 | (RefSeq) BAIAP2")
        );
        assert_eq!(records[1]["entry_id"], FieldValue::from("ece:Z5100"));
    }

    #[test]
    fn sequence_lines_are_concatenated() {
        let records = parse_sequences(FASTA);
        let sequence = records[0]["sequence"].as_text().unwrap();
        assert_eq!(sequence.len(), 120);
        assert!(sequence.starts_with("MSLSRSEEMHRL"));
        assert!(sequence.ends_with("RYLSAAL"));
        assert!(!sequence.contains('\n'));
    }

    #[test]
    fn fields_are_in_fixed_order() {
        let records = parse_sequences(">a b\nMK\n");
        let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["entry_id", "description", "sequence"]);
    }

    #[test]
    fn header_without_description() {
        let records = parse_sequences(">hsa:1\nMK\n");
        assert_eq!(records[0]["description"], FieldValue::from(""));
        assert_eq!(records[0]["sequence"], FieldValue::from("MK"));
    }

    #[test]
    fn whitespace_run_after_id_is_dropped() {
        let records = parse_sequences(">id \t  two words\nAC\n");
        assert_eq!(records[0]["entry_id"], FieldValue::from("id"));
        assert_eq!(records[0]["description"], FieldValue::from("two words"));
    }

    #[test]
    fn marker_inside_header_does_not_split() {
        let records = parse_sequences(">id a->b\nAC\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["description"], FieldValue::from("a->b"));
    }

    #[test]
    fn empty_blocks_are_skipped() {
        let records = parse_sequences("\n>\n>x\nA\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["entry_id"], FieldValue::from("x"));
    }

    #[test]
    fn header_only_block_has_empty_sequence() {
        let records = parse_sequences(">x desc");
        assert_eq!(records[0]["sequence"], FieldValue::from(""));
    }
}
