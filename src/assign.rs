//! Variant assignment.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::{AbTestError, Result};
use crate::record::{AssignedDataset, AssignedRecord, UserRecord, Variant};

/// Number of records that receive variant "A".
pub fn split_index(len: usize, split_percent: u32) -> usize {
    len * split_percent as usize / 100
}

/* ---------------------------------------------------------------------------
 *  Label-then-shuffle assignment
 * ---------------------------------------------------------------------------
 * Labels are handed out by position: the first `floor(n * split / 100)`
 * records get "A" and the remainder get "B". Only then is the whole set put
 * through a Fisher-Yates shuffle, so the group sizes are exact for every `n`
 * while the final position of a record says nothing about its label.
 *
 * Assumptions:
 *   * `split_percent` is a percentage (at most 100); larger values are
 *     rejected rather than producing more "A" labels than records.
 *   * Records are cloned into the result; the caller's slice is unchanged.
 */
pub fn assign(
    data: &[UserRecord],
    split_percent: u32,
    rng: &mut impl Rng,
) -> Result<AssignedDataset> {
    if split_percent > 100 {
        return Err(AbTestError::InvalidConfig(format!(
            "split percentage must be at most 100, got {split_percent}"
        )));
    }
    if data.is_empty() {
        return Err(AbTestError::EmptyDataset);
    }
    let cut = split_index(data.len(), split_percent);

    let mut assigned: AssignedDataset = data
        .iter()
        .enumerate()
        .map(|(i, record)| AssignedRecord {
            record: record.clone(),
            variant: if i < cut { Variant::A } else { Variant::B },
        })
        .collect();
    // In-place Fisher-Yates; labels travel with their records.
    assigned.shuffle(rng);

    debug!(
        users = data.len(),
        a = cut,
        b = data.len().saturating_sub(cut),
        "assigned variants"
    );
    Ok(assigned)
}
