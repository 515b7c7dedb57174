//! Bit-depth reduction of u8 image tensors.
//!
//! Two implementations of the same capability, one per processing device.
//! The variant is chosen once when the manager is constructed, call sites
//! never branch on device identity again.

use candle::{DType, Device, Tensor};

use crate::error::{Error, Result};

/// Reduce the effective bit width of a u8 tensor without leaving its device.
pub trait Downsampler: Send + Sync {
    /// Target bit width, in 1..=8.
    fn bit_width(&self) -> u32;

    /// Quantize `images`, returning a tensor resident on the same device.
    fn downsample(&self, images: &Tensor) -> Result<Tensor>;
}

fn check_bit_width(bit_width: u32) -> Result<()> {
    if !(1..=8).contains(&bit_width) {
        return Err(Error::InvalidBitWidth { bit_width });
    }
    Ok(())
}

fn check_device(op: &'static str, images: &Tensor, device: &Device) -> Result<()> {
    if !images.device().same_device(device) {
        return Err(Error::DeviceMismatch {
            op,
            expected: device.location(),
            got: images.device().location(),
        });
    }
    Ok(())
}

/// Map u8 samples onto the `2^bit_width` evenly spaced levels of 0..=255.
///
/// Every op dispatches through the backend of `images`, so the data never
/// leaves its device. Deterministic given the input and the bit width.
fn requantize(images: &Tensor, bit_width: u32) -> Result<Tensor> {
    if bit_width == 8 {
        return Ok(images.clone());
    }
    let levels = ((1u32 << bit_width) - 1) as f64;
    let step = 255.0 / levels;
    let quantized = images
        .to_dtype(DType::F32)?
        .affine(1.0 / step, 0.0)?
        .round()?
        .affine(step, 0.0)?
        .round()?
        .clamp(0f32, 255f32)?
        .to_dtype(DType::U8)?;
    Ok(quantized)
}

/// Downsampler running on the host.
pub struct CpuDownsampler {
    bit_width: u32,
}

impl CpuDownsampler {
    pub fn new(bit_width: u32) -> Result<Self> {
        check_bit_width(bit_width)?;
        Ok(Self { bit_width })
    }
}

impl Downsampler for CpuDownsampler {
    fn bit_width(&self) -> u32 {
        self.bit_width
    }

    fn downsample(&self, images: &Tensor) -> Result<Tensor> {
        check_device("cpu downsample", images, &Device::Cpu)?;
        requantize(images, self.bit_width)
    }
}

/// Downsampler bound to one cuda device.
pub struct CudaDownsampler {
    device: Device,
    bit_width: u32,
}

impl CudaDownsampler {
    pub fn new(device: Device, bit_width: u32) -> Result<Self> {
        check_bit_width(bit_width)?;
        if !device.is_cuda() {
            crate::bail!(
                "cuda downsampler bound to a non-cuda device {:?}",
                device.location()
            );
        }
        Ok(Self { device, bit_width })
    }
}

impl Downsampler for CudaDownsampler {
    fn bit_width(&self) -> u32 {
        self.bit_width
    }

    fn downsample(&self, images: &Tensor) -> Result<Tensor> {
        check_device("cuda downsample", images, &self.device)?;
        requantize(images, self.bit_width)
    }
}

/// Select the downsampler variant matching `device`.
pub fn for_device(device: &Device, bit_width: u32) -> Result<Box<dyn Downsampler>> {
    match device {
        Device::Cpu => Ok(Box::new(CpuDownsampler::new(bit_width)?)),
        Device::Cuda(_) => Ok(Box::new(CudaDownsampler::new(device.clone(), bit_width)?)),
        _ => Err(Error::msg(format!(
            "no downsampler available for {:?}",
            device.location()
        ))),
    }
}
