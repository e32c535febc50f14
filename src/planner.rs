//! Batch planning: splits an entry list into request-sized batches

use crate::error::{Error, Result};
use crate::types::{Batch, EntryId};

/// Split `entries` into consecutive batches of at most `max_batch_size`.
///
/// Concatenating the batches in index order reproduces `entries` exactly,
/// duplicates included. Every batch except possibly the last holds exactly
/// `max_batch_size` entries. An empty input yields no batches.
///
/// # Errors
///
/// [`Error::InvalidConfiguration`] when `max_batch_size` is zero.
pub fn plan(entries: &[EntryId], max_batch_size: usize) -> Result<Vec<Batch>> {
    if max_batch_size == 0 {
        return Err(Error::config(
            "batch size must be greater than zero",
            "batch_size",
        ));
    }

    let batches: Vec<Batch> = entries
        .chunks(max_batch_size)
        .enumerate()
        .map(|(index, chunk)| Batch::new(index, chunk.to_vec()))
        .collect();

    tracing::debug!(
        entries = entries.len(),
        batch_size = max_batch_size,
        batches = batches.len(),
        "planned batches"
    );

    Ok(batches)
}
