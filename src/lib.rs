//! Quantized MNIST dataset management for candle.
//!
//! This crate owns a fixed-format image corpus (28×28 u8 images with labels
//! in ten classes), runs one bit-depth quantization pass whose processing
//! device may differ from the device the result is stored on, and serves
//! class-balanced batches drawn by stratified sampling.
//!
//! ```rust,no_run
//! use candle_quantized_mnist::{DatasetManager, DeviceKind};
//!
//! # fn main() -> candle_quantized_mnist::Result<()> {
//! let mut manager = DatasetManager::new(
//!     "data/train-images.npy",
//!     "data/train-labels.npy",
//!     4,  // bit width
//!     64, // batch size
//!     DeviceKind::Cpu,
//!     DeviceKind::Cpu,
//! )?;
//! manager.load()?;
//! manager.quantize()?;
//! let (images, labels) = manager.sample()?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod downsample;
pub mod error;
pub mod manager;
pub mod mnist;
pub mod partition;
pub mod sampler;

pub use device::{DeviceKind, DeviceMode};
pub use downsample::{CpuDownsampler, CudaDownsampler, Downsampler};
pub use error::{Error, Result};
pub use manager::DatasetManager;
pub use partition::ClassPartition;

/// Image height and width, fixed by the corpus format.
pub const IMAGE_DIM: usize = 28;
/// Number of label classes.
pub const NUM_CLASSES: usize = 10;
