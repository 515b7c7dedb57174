//! Stratified batch index selection.

use rand::Rng;

use crate::error::{Error, Result};
use crate::partition::ClassPartition;
use crate::NUM_CLASSES;

/// Draw a class-balanced selection of `batch_size` corpus indices.
///
/// Classes are visited in label order. `batch_size / 10` indices are drawn
/// from each class, with the remainder going one each to the first
/// `batch_size % 10` classes. Draws are uniform without replacement within a
/// class and independent across calls, so successive batches may repeat
/// indices.
///
/// A class holding fewer samples than its target leaves the batch short,
/// which is reported as [`Error::BatchUnderfilled`] instead of returning a
/// short batch.
pub fn stratified_indices<R: Rng + ?Sized>(
    partition: &ClassPartition,
    batch_size: usize,
    rng: &mut R,
) -> Result<Vec<u32>> {
    let base = batch_size / NUM_CLASSES;
    let extra = batch_size % NUM_CLASSES;

    let mut selected = Vec::with_capacity(batch_size);
    for class in 0..NUM_CLASSES {
        let indices = partition.class(class);
        let target = if class < extra { base + 1 } else { base };
        let count = target.min(indices.len());
        for position in rand::seq::index::sample(rng, indices.len(), count) {
            selected.push(indices[position]);
        }
    }

    if selected.len() != batch_size {
        return Err(Error::BatchUnderfilled {
            expected: batch_size,
            got: selected.len(),
        });
    }
    Ok(selected)
}
