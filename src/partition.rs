//! Per-class index partition of the label sequence.

use candle::{Device, Tensor};

use crate::error::{Error, Result};
use crate::NUM_CLASSES;

/// Ordered, disjoint index sets, one per class.
///
/// Built once when the corpus is loaded and never mutated afterwards. Every
/// corpus index appears in exactly one class set, so the union of the sets
/// is the full index range.
#[derive(Debug, Clone)]
pub struct ClassPartition {
    classes: Vec<Vec<u32>>,
}

impl ClassPartition {
    /// Split `labels` into one index set per class, in corpus order.
    pub fn from_labels(labels: &[u32]) -> Result<Self> {
        let mut classes = vec![Vec::new(); NUM_CLASSES];
        for (index, &label) in labels.iter().enumerate() {
            if label as usize >= NUM_CLASSES {
                return Err(Error::InvalidLabel {
                    index,
                    label,
                    num_classes: NUM_CLASSES,
                });
            }
            classes[label as usize].push(index as u32);
        }
        Ok(Self { classes })
    }

    /// The corpus indices belonging to `class`.
    pub fn class(&self, class: usize) -> &[u32] {
        &self.classes[class]
    }

    /// Number of samples per class, in class order.
    pub fn class_counts(&self) -> Vec<usize> {
        self.classes.iter().map(|c| c.len()).collect()
    }

    /// Total number of partitioned indices.
    pub fn num_samples(&self) -> usize {
        self.classes.iter().map(|c| c.len()).sum()
    }
}

/// One-hot encode `labels` as a host-resident `(n, 10)` u8 tensor.
pub fn one_hot(labels: &[u32]) -> Result<Tensor> {
    let mut rows = vec![0u8; labels.len() * NUM_CLASSES];
    for (index, &label) in labels.iter().enumerate() {
        if label as usize >= NUM_CLASSES {
            return Err(Error::InvalidLabel {
                index,
                label,
                num_classes: NUM_CLASSES,
            });
        }
        rows[index * NUM_CLASSES + label as usize] = 1;
    }
    Ok(Tensor::from_vec(
        rows,
        (labels.len(), NUM_CLASSES),
        &Device::Cpu,
    )?)
}
