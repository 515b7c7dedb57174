use candle::{DType, DeviceLocation, Shape};

use crate::device::DeviceKind;

/// Main library error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    // Configuration errors, raised at construction.
    #[error("unsupported device mode, process: {process:?}, storage: {storage:?}")]
    UnsupportedDeviceMode {
        process: DeviceKind,
        storage: DeviceKind,
    },

    #[error("cuda support requested but no cuda device is available")]
    CudaUnavailable,

    #[error("invalid bit width {bit_width}, expected a value in 1..=8")]
    InvalidBitWidth { bit_width: u32 },

    // Validation errors, raised at load.
    #[error("expected images of shape (n, 28, 28) and dtype u8, got {shape:?} and {dtype:?}")]
    InvalidCorpus { shape: Shape, dtype: DType },

    #[error("expected a rank-1 integer label tensor, got {shape:?} and {dtype:?}")]
    InvalidLabels { shape: Shape, dtype: DType },

    #[error("label count mismatch, images: {images}, labels: {labels}")]
    LabelCountMismatch { images: usize, labels: usize },

    #[error("label {label} at index {index} is out of range for {num_classes} classes")]
    InvalidLabel {
        index: usize,
        label: u32,
        num_classes: usize,
    },

    // Sequencing errors. The manager keeps its prior state when these are
    // returned, the caller may retry after the missing prerequisite.
    #[error("cannot {op}, no corpus has been loaded")]
    NotLoaded { op: &'static str },

    #[error("cannot {op}, the corpus has not been quantized")]
    NotQuantized { op: &'static str },

    #[error("a corpus is already loaded, the manager is single-use")]
    AlreadyLoaded,

    #[error("the corpus has already been quantized")]
    AlreadyQuantized,

    // Invariant violations.
    #[error("stratified batch underfilled, expected {expected} samples, got {got}")]
    BatchUnderfilled { expected: usize, got: usize },

    #[error("device mismatch in {op}, expected {expected:?}, got {got:?}")]
    DeviceMismatch {
        op: &'static str,
        expected: DeviceLocation,
        got: DeviceLocation,
    },

    #[error(transparent)]
    Candle(#[from] candle::Error),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Msg(String),
}

impl Error {
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
