//! Device-mode selection for the quantization pipeline.

use candle::Device;

use crate::error::{Error, Result};

/// Requested placement for the processing or storage role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Cuda,
}

impl DeviceKind {
    /// Bind a concrete device for this request.
    ///
    /// Cuda requests fail when cuda support is absent, either because the
    /// crate was built without the `cuda` feature or because no device is
    /// present at runtime.
    fn bind(&self) -> Result<Device> {
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda => {
                if !candle::utils::cuda_is_available() {
                    return Err(Error::CudaUnavailable);
                }
                Ok(Device::new_cuda(0)?)
            }
        }
    }
}

/// A validated (processing, storage) device pair.
///
/// Exactly three combinations are accepted: cpu→cpu, cuda→cpu and cuda→cuda.
/// Quantizing on the cpu and storing the result on the accelerator is not a
/// supported mode, and any cuda role requires cuda support to be available.
/// Both checks run at construction, before any data is touched.
#[derive(Debug, Clone)]
pub struct DeviceMode {
    process: Device,
    storage: Device,
}

impl DeviceMode {
    pub fn new(process: DeviceKind, storage: DeviceKind) -> Result<Self> {
        if process == DeviceKind::Cpu && storage == DeviceKind::Cuda {
            return Err(Error::UnsupportedDeviceMode { process, storage });
        }
        let storage_device = storage.bind()?;
        // When both roles name the accelerator they must share one handle,
        // distinct cuda handles do not compare as the same device.
        let process_device = if process == storage {
            storage_device.clone()
        } else {
            process.bind()?
        };
        Ok(Self {
            process: process_device,
            storage: storage_device,
        })
    }

    /// The device the quantization computation executes on.
    pub fn process(&self) -> &Device {
        &self.process
    }

    /// The device the quantized corpus is retained on between batch draws.
    pub fn storage(&self) -> &Device {
        &self.storage
    }
}
