use candle::{DType, Device, Tensor};
use candle_quantized_mnist::{
    mnist, DatasetManager, DeviceKind, Error, Result, IMAGE_DIM, NUM_CLASSES,
};

struct TmpFile(std::path::PathBuf);

impl TmpFile {
    fn create(base: &str) -> TmpFile {
        let filename = std::env::temp_dir().join(format!(
            "candle-quantized-mnist-{}-{}-{:?}",
            base,
            std::process::id(),
            std::thread::current().id(),
        ));
        TmpFile(filename)
    }
}

impl std::convert::AsRef<std::path::Path> for TmpFile {
    fn as_ref(&self) -> &std::path::Path {
        self.0.as_path()
    }
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        std::fs::remove_file(&self.0).unwrap()
    }
}

/// A balanced corpus of `n` images where every pixel of image `i` holds
/// `(i % 10) * 25` and the label matches, so batches can be checked for
/// image/label alignment.
fn corpus(n: usize) -> Result<(Tensor, Tensor)> {
    let mut pixels = Vec::with_capacity(n * IMAGE_DIM * IMAGE_DIM);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let label = (i % NUM_CLASSES) as u8;
        pixels.extend(std::iter::repeat(label * 25).take(IMAGE_DIM * IMAGE_DIM));
        labels.push(label);
    }
    let images = Tensor::from_vec(pixels, (n, IMAGE_DIM, IMAGE_DIM), &Device::Cpu)?;
    let labels = Tensor::from_vec(labels, n, &Device::Cpu)?;
    Ok((images, labels))
}

fn manager(bit_width: u32, batch_size: usize) -> Result<DatasetManager> {
    DatasetManager::new(
        "images.npy",
        "labels.npy",
        bit_width,
        batch_size,
        DeviceKind::Cpu,
        DeviceKind::Cpu,
    )
}

#[test]
fn device_pair_validation() -> Result<()> {
    let m = DatasetManager::new(
        "i.npy",
        "l.npy",
        4,
        16,
        DeviceKind::Cpu,
        DeviceKind::Cpu,
    )?;
    assert!(!m.is_loaded());

    let err = DatasetManager::new(
        "i.npy",
        "l.npy",
        4,
        16,
        DeviceKind::Cpu,
        DeviceKind::Cuda,
    );
    assert!(matches!(err, Err(Error::UnsupportedDeviceMode { .. })));

    if !candle::utils::cuda_is_available() {
        let err = DatasetManager::new(
            "i.npy",
            "l.npy",
            4,
            16,
            DeviceKind::Cuda,
            DeviceKind::Cpu,
        );
        assert!(matches!(err, Err(Error::CudaUnavailable)));
        let err = DatasetManager::new(
            "i.npy",
            "l.npy",
            4,
            16,
            DeviceKind::Cuda,
            DeviceKind::Cuda,
        );
        assert!(matches!(err, Err(Error::CudaUnavailable)));
    }
    Ok(())
}

#[test]
fn sequencing_errors() -> Result<()> {
    let mut m = manager(4, 20)?;
    assert!(matches!(m.quantize(), Err(Error::NotLoaded { .. })));
    assert!(matches!(m.sample(), Err(Error::NotLoaded { .. })));
    assert!(matches!(m.images(), Err(Error::NotLoaded { .. })));

    let (images, labels) = corpus(100)?;
    m.load_tensors(images, labels)?;
    assert!(m.is_loaded());
    assert!(!m.is_quantized());
    assert!(matches!(m.sample(), Err(Error::NotQuantized { .. })));

    let (images, labels) = corpus(100)?;
    assert!(matches!(
        m.load_tensors(images, labels),
        Err(Error::AlreadyLoaded)
    ));

    m.quantize()?;
    assert!(m.is_quantized());
    assert!(matches!(m.quantize(), Err(Error::AlreadyQuantized)));

    // Sampling is repeatable and state-preserving.
    m.sample()?;
    m.sample()?;
    assert!(m.is_quantized());
    Ok(())
}

#[test]
fn rejects_malformed_corpus() -> Result<()> {
    // Wrong width fails before any partition is built.
    let mut m = manager(4, 10)?;
    let images = Tensor::zeros((4, IMAGE_DIM, IMAGE_DIM - 1), DType::U8, &Device::Cpu)?;
    let labels = Tensor::zeros(4, DType::U8, &Device::Cpu)?;
    assert!(matches!(
        m.load_tensors(images, labels),
        Err(Error::InvalidCorpus { .. })
    ));
    assert!(!m.is_loaded());
    assert_eq!(m.num_samples(), 0);

    // Wrong dtype.
    let images = Tensor::zeros((4, IMAGE_DIM, IMAGE_DIM), DType::F32, &Device::Cpu)?;
    let labels = Tensor::zeros(4, DType::U8, &Device::Cpu)?;
    assert!(matches!(
        m.load_tensors(images, labels),
        Err(Error::InvalidCorpus { .. })
    ));

    // Wrong rank.
    let images = Tensor::zeros((IMAGE_DIM, IMAGE_DIM), DType::U8, &Device::Cpu)?;
    let labels = Tensor::zeros(4, DType::U8, &Device::Cpu)?;
    assert!(matches!(
        m.load_tensors(images, labels),
        Err(Error::InvalidCorpus { .. })
    ));
    Ok(())
}

#[test]
fn rejects_malformed_labels() -> Result<()> {
    let mut m = manager(4, 10)?;

    // Count mismatch.
    let images = Tensor::zeros((4, IMAGE_DIM, IMAGE_DIM), DType::U8, &Device::Cpu)?;
    let labels = Tensor::zeros(5, DType::U8, &Device::Cpu)?;
    assert!(matches!(
        m.load_tensors(images, labels),
        Err(Error::LabelCountMismatch {
            images: 4,
            labels: 5
        })
    ));

    // Non-integer dtype.
    let images = Tensor::zeros((4, IMAGE_DIM, IMAGE_DIM), DType::U8, &Device::Cpu)?;
    let labels = Tensor::zeros(4, DType::F32, &Device::Cpu)?;
    assert!(matches!(
        m.load_tensors(images, labels),
        Err(Error::InvalidLabels { .. })
    ));

    // Out-of-range label.
    let images = Tensor::zeros((2, IMAGE_DIM, IMAGE_DIM), DType::U8, &Device::Cpu)?;
    let labels = Tensor::from_vec(vec![3u8, 10], 2, &Device::Cpu)?;
    assert!(matches!(
        m.load_tensors(images, labels),
        Err(Error::InvalidLabel {
            index: 1,
            label: 10,
            ..
        })
    ));
    assert!(!m.is_loaded());
    Ok(())
}

#[test]
fn load_builds_partition_and_one_hot() -> Result<()> {
    let mut m = manager(4, 10)?;
    let (images, labels) = corpus(100)?;
    m.load_tensors(images, labels)?;
    assert_eq!(m.num_samples(), 100);
    assert_eq!(m.class_counts(), vec![10; NUM_CLASSES]);
    assert_eq!(m.labels()?.dims(), &[100, NUM_CLASSES]);
    assert_eq!(m.labels()?.dtype(), DType::U8);
    Ok(())
}

#[test]
fn npy_load_roundtrip() -> Result<()> {
    let images_file = TmpFile::create("images.npy");
    let labels_file = TmpFile::create("labels.npy");
    let (images, labels) = corpus(50)?;
    images.write_npy(&images_file)?;
    labels.write_npy(&labels_file)?;

    let mut m = DatasetManager::new(
        images_file.0.clone(),
        labels_file.0.clone(),
        4,
        10,
        DeviceKind::Cpu,
        DeviceKind::Cpu,
    )?;
    m.load()?;
    assert_eq!(m.num_samples(), 50);
    assert_eq!(m.class_counts(), vec![5; NUM_CLASSES]);
    m.quantize()?;
    let (images, labels) = m.sample()?;
    assert_eq!(images.dims(), &[10, IMAGE_DIM, IMAGE_DIM]);
    assert_eq!(labels.dims(), &[10, NUM_CLASSES]);
    Ok(())
}

#[test]
fn idx_files_roundtrip() -> Result<()> {
    let n = 4usize;
    let mut image_bytes = Vec::new();
    image_bytes.extend_from_slice(&2051u32.to_be_bytes());
    image_bytes.extend_from_slice(&(n as u32).to_be_bytes());
    image_bytes.extend_from_slice(&28u32.to_be_bytes());
    image_bytes.extend_from_slice(&28u32.to_be_bytes());
    image_bytes.extend(std::iter::repeat(7u8).take(n * 28 * 28));
    let mut label_bytes = Vec::new();
    label_bytes.extend_from_slice(&2049u32.to_be_bytes());
    label_bytes.extend_from_slice(&(n as u32).to_be_bytes());
    label_bytes.extend_from_slice(&[0, 1, 2, 3]);

    let images_file = TmpFile::create("images-idx3-ubyte");
    let labels_file = TmpFile::create("labels-idx1-ubyte");
    std::fs::write(&images_file, &image_bytes)?;
    std::fs::write(&labels_file, &label_bytes)?;

    let (images, labels) = mnist::load_idx(&images_file, &labels_file)?;
    assert_eq!(images.dims(), &[n, IMAGE_DIM, IMAGE_DIM]);
    assert_eq!(images.dtype(), DType::U8);
    assert_eq!(labels.to_vec1::<u8>()?, [0, 1, 2, 3]);

    // The loaded pair goes through the same manager path as npy data.
    let mut m = manager(8, 0)?;
    m.load_tensors(images, labels)?;
    assert_eq!(m.num_samples(), n);

    // A corrupted magic number is rejected.
    image_bytes[3] = 99;
    std::fs::write(&images_file, &image_bytes)?;
    assert!(mnist::load_idx(&images_file, &labels_file).is_err());
    Ok(())
}

#[test]
fn seeded_sampling_is_reproducible() -> Result<()> {
    let mut a = manager(4, 20)?;
    let mut b = manager(4, 20)?;
    for m in [&mut a, &mut b] {
        let (images, labels) = corpus(100)?;
        m.load_tensors(images, labels)?;
        m.quantize()?;
        m.set_seed(42);
    }
    let (images_a, labels_a) = a.sample()?;
    let (images_b, labels_b) = b.sample()?;
    assert_eq!(images_a.to_vec3::<u8>()?, images_b.to_vec3::<u8>()?);
    assert_eq!(labels_a.to_vec2::<u8>()?, labels_b.to_vec2::<u8>()?);
    Ok(())
}
