//! The dataset manager, an explicit lifecycle over load → quantize → sample.

use std::path::PathBuf;

use candle::{Device, Tensor};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::device::{DeviceKind, DeviceMode};
use crate::downsample::{self, Downsampler};
use crate::error::{Error, Result};
use crate::partition::{self, ClassPartition};
use crate::{mnist, sampler};

/// Corpus data carried through the loaded and quantized states.
struct CorpusData {
    images: Tensor,
    /// One-hot labels, always host-resident.
    labels: Tensor,
    partition: ClassPartition,
}

/// Lifecycle of the corpus.
///
/// `Unloaded → Loaded → Quantized`, no transitions back: the manager is
/// single-use per corpus. After the quantize transition the images tensor is
/// resident on the configured storage device, the raw corpus is gone.
enum State {
    Unloaded,
    Loaded(CorpusData),
    Quantized(CorpusData),
}

/// Owns an MNIST-format corpus and serves class-balanced batches of it,
/// after one bit-depth quantization pass.
///
/// The processing device (where quantization executes) and the storage
/// device (where the quantized corpus is retained) are validated as a pair
/// at construction, see [`DeviceMode`].
pub struct DatasetManager {
    images_path: PathBuf,
    labels_path: PathBuf,
    batch_size: usize,
    mode: DeviceMode,
    downsampler: Box<dyn Downsampler>,
    rng: StdRng,
    state: State,
}

impl DatasetManager {
    /// Validate the device pair and bind the matching downsampler.
    ///
    /// Capability failures (unsupported device pair, cuda requested without
    /// cuda support, bad bit width) are fatal here, before any data is
    /// touched.
    pub fn new(
        images_path: impl Into<PathBuf>,
        labels_path: impl Into<PathBuf>,
        bit_width: u32,
        batch_size: usize,
        process: DeviceKind,
        storage: DeviceKind,
    ) -> Result<Self> {
        let mode = DeviceMode::new(process, storage)?;
        let downsampler = downsample::for_device(mode.process(), bit_width)?;
        Ok(Self {
            images_path: images_path.into(),
            labels_path: labels_path.into(),
            batch_size,
            mode,
            downsampler,
            rng: StdRng::from_os_rng(),
            state: State::Unloaded,
        })
    }

    /// Re-seed the sampling rng, making subsequent batches reproducible.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn bit_width(&self) -> u32 {
        self.downsampler.bit_width()
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(self.state, State::Unloaded)
    }

    pub fn is_quantized(&self) -> bool {
        matches!(self.state, State::Quantized(_))
    }

    /// Number of samples in the loaded corpus, 0 before load.
    pub fn num_samples(&self) -> usize {
        match &self.state {
            State::Unloaded => 0,
            State::Loaded(data) | State::Quantized(data) => data.partition.num_samples(),
        }
    }

    /// Per-class sample counts, empty before load.
    pub fn class_counts(&self) -> Vec<usize> {
        match &self.state {
            State::Unloaded => Vec::new(),
            State::Loaded(data) | State::Quantized(data) => data.partition.class_counts(),
        }
    }

    /// The corpus tensor for the current state, raw after `load` and
    /// quantized after `quantize`.
    pub fn images(&self) -> Result<&Tensor> {
        match &self.state {
            State::Unloaded => Err(Error::NotLoaded { op: "images" }),
            State::Loaded(data) | State::Quantized(data) => Ok(&data.images),
        }
    }

    /// The host-resident one-hot label tensor.
    pub fn labels(&self) -> Result<&Tensor> {
        match &self.state {
            State::Unloaded => Err(Error::NotLoaded { op: "labels" }),
            State::Loaded(data) | State::Quantized(data) => Ok(&data.labels),
        }
    }

    /// Load the corpus and labels from their `.npy` files.
    pub fn load(&mut self) -> Result<()> {
        let (images, labels) = mnist::load_npy(&self.images_path, &self.labels_path)?;
        self.load_tensors(images, labels)
    }

    /// Load a corpus that is already resident as tensors.
    ///
    /// Shares the validation path of [`load`](Self::load): shape `(n, 28,
    /// 28)` u8 images, a rank-1 integer label tensor of matching length with
    /// values below 10. Validation runs before any state changes, a
    /// malformed corpus leaves the manager unloaded.
    pub fn load_tensors(&mut self, images: Tensor, labels: Tensor) -> Result<()> {
        if !matches!(self.state, State::Unloaded) {
            return Err(Error::AlreadyLoaded);
        }
        let num_images = mnist::validate_images(&images)?;
        let labels = mnist::labels_vec(&labels)?;
        if labels.len() != num_images {
            return Err(Error::LabelCountMismatch {
                images: num_images,
                labels: labels.len(),
            });
        }
        let partition = ClassPartition::from_labels(&labels)?;
        let labels = partition::one_hot(&labels)?;
        self.state = State::Loaded(CorpusData {
            images,
            labels,
            partition,
        });
        Ok(())
    }

    /// Run the quantization pass, leaving the corpus on the storage device.
    ///
    /// The raw tensor is dropped when the state advances, only the quantized
    /// tensor survives. Runs once per load, a second call is a sequencing
    /// error.
    pub fn quantize(&mut self) -> Result<()> {
        match &self.state {
            State::Unloaded => return Err(Error::NotLoaded { op: "quantize" }),
            State::Quantized(_) => return Err(Error::AlreadyQuantized),
            State::Loaded(_) => {}
        }
        let State::Loaded(data) = std::mem::replace(&mut self.state, State::Unloaded) else {
            return Err(Error::NotLoaded { op: "quantize" });
        };
        match self.run_pipeline(&data.images) {
            Ok(images) => {
                self.state = State::Quantized(CorpusData { images, ..data });
                Ok(())
            }
            Err(e) => {
                // A failed pass keeps the raw corpus so the caller may retry.
                self.state = State::Loaded(data);
                Err(e)
            }
        }
    }

    /// Stage to the processing device, downsample there, then relocate the
    /// result to the storage device. Superseded copies are dropped as the
    /// pipeline advances.
    fn run_pipeline(&self, raw: &Tensor) -> Result<Tensor> {
        let staged = if raw.device().same_device(self.mode.process()) {
            raw.clone()
        } else {
            raw.to_device(self.mode.process())?
        };
        let quantized = self.downsampler.downsample(&staged)?;
        drop(staged);
        if quantized.device().same_device(self.mode.storage()) {
            Ok(quantized)
        } else {
            Ok(quantized.to_device(self.mode.storage())?)
        }
    }

    /// Draw one class-balanced batch of images and one-hot labels.
    ///
    /// The image batch comes back resident on the storage device, shape
    /// `(batch_size, 28, 28)` u8; the label batch is host-resident, shape
    /// `(batch_size, 10)` u8, index-aligned with the images. Legal only
    /// after `quantize`, repeatable, and state-preserving. Indices may
    /// repeat across successive batches.
    pub fn sample(&mut self) -> Result<(Tensor, Tensor)> {
        let Self {
            state,
            batch_size,
            rng,
            ..
        } = self;
        let data = match state {
            State::Unloaded => return Err(Error::NotLoaded { op: "sample" }),
            State::Loaded(_) => return Err(Error::NotQuantized { op: "sample" }),
            State::Quantized(data) => data,
        };
        let selected = sampler::stratified_indices(&data.partition, *batch_size, rng)?;
        let selected = Tensor::from_vec(selected, *batch_size, &Device::Cpu)?;
        let labels = data.labels.index_select(&selected, 0)?;
        let images = if data.images.device().is_cpu() {
            data.images.index_select(&selected, 0)?
        } else {
            // The gather runs on the host, the slice then moves back to the
            // storage device.
            data.images
                .to_device(&Device::Cpu)?
                .index_select(&selected, 0)?
                .to_device(data.images.device())?
        };
        Ok((images, labels))
    }
}
