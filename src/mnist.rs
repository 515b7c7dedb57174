//! Corpus loading and validation.
//!
//! Two on-disk sources are supported: `.npy` array pairs, and the raw MNIST
//! IDX format (all values big-endian):
//!
//!   images: magic(2051) | count(u32) | rows(u32) | cols(u32) | pixels(u8...)
//!   labels: magic(2049) | count(u32) | labels(u8...)

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use candle::{DType, Device, Tensor};

use crate::error::{Error, Result};
use crate::IMAGE_DIM;

fn read_u32<T: Read>(reader: &mut T) -> Result<u32> {
    use byteorder::ReadBytesExt;
    Ok(reader.read_u32::<byteorder::BigEndian>()?)
}

fn check_magic_number<T: Read>(reader: &mut T, expected: u32) -> Result<()> {
    let magic_number = read_u32(reader)?;
    if magic_number != expected {
        crate::bail!("incorrect magic number {magic_number} != {expected}");
    }
    Ok(())
}

/// Read an image/label pair of `.npy` files into host tensors.
pub fn load_npy(
    images_path: impl AsRef<Path>,
    labels_path: impl AsRef<Path>,
) -> Result<(Tensor, Tensor)> {
    let images = Tensor::read_npy(images_path)?;
    let labels = Tensor::read_npy(labels_path)?;
    Ok((images, labels))
}

/// Read an image/label pair of raw MNIST IDX ubyte files into host tensors.
///
/// Images keep their native `(n, rows, cols)` u8 layout, labels come back as
/// a rank-1 u8 tensor.
pub fn load_idx(
    images_path: impl AsRef<Path>,
    labels_path: impl AsRef<Path>,
) -> Result<(Tensor, Tensor)> {
    let mut reader = BufReader::new(File::open(images_path)?);
    check_magic_number(&mut reader, 2051)?;
    let samples = read_u32(&mut reader)? as usize;
    let rows = read_u32(&mut reader)? as usize;
    let cols = read_u32(&mut reader)? as usize;
    let mut data = vec![0u8; samples * rows * cols];
    reader.read_exact(&mut data)?;
    let images = Tensor::from_vec(data, (samples, rows, cols), &Device::Cpu)?;

    let mut reader = BufReader::new(File::open(labels_path)?);
    check_magic_number(&mut reader, 2049)?;
    let samples = read_u32(&mut reader)? as usize;
    let mut data = vec![0u8; samples];
    reader.read_exact(&mut data)?;
    let labels = Tensor::from_vec(data, samples, &Device::Cpu)?;

    Ok((images, labels))
}

/// Check the corpus invariant, shape `(n, 28, 28)` with dtype u8.
///
/// Returns `n`. Runs before any other load-time state is built, a malformed
/// corpus never produces a partially loaded manager.
pub fn validate_images(images: &Tensor) -> Result<usize> {
    let dims = images.dims();
    let valid = dims.len() == 3
        && dims[1] == IMAGE_DIM
        && dims[2] == IMAGE_DIM
        && images.dtype() == DType::U8;
    if !valid {
        return Err(Error::InvalidCorpus {
            shape: images.shape().clone(),
            dtype: images.dtype(),
        });
    }
    Ok(dims[0])
}

/// Extract labels as host u32 values, requiring a rank-1 integer tensor.
pub fn labels_vec(labels: &Tensor) -> Result<Vec<u32>> {
    let integer = matches!(labels.dtype(), DType::U8 | DType::U32 | DType::I64);
    if labels.rank() != 1 || !integer {
        return Err(Error::InvalidLabels {
            shape: labels.shape().clone(),
            dtype: labels.dtype(),
        });
    }
    Ok(labels.to_dtype(DType::U32)?.to_vec1::<u32>()?)
}
