//! Model loading: fetch a weight file and deserialize it into an inference module

use crate::fetcher::{DefaultFetcher, ModelFetcher};
use crate::inference::{CandleModule, InferenceModule};
use crate::tensor::TensorResultExt;
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::resnet;
use charid_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Expected location of a safetensors export of the Super Mario classifier.
///
/// The release publishes `super_mario.ptl` (see [`PUBLISHED_MODEL_URL`]), a
/// lite-interpreter archive that candle cannot execute. This URL assumes the
/// same weights exported as a state dict next to it; point the loader at your
/// own export if it is not there.
pub const DEFAULT_MODEL_URL: &str =
    "https://github.com/raedle/classify-super-mario/releases/download/v0.0.1-alpha.11/super_mario.safetensors";

/// The lite-interpreter archive actually published with the release
pub const PUBLISHED_MODEL_URL: &str =
    "https://github.com/raedle/classify-super-mario/releases/download/v0.0.1-alpha.11/super_mario.ptl";

/// Device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// CPU inference (always available)
    #[default]
    Cpu,
    /// CUDA GPU inference (if available)
    Cuda(usize), // GPU index
    /// Metal (Apple Silicon)
    Metal(usize),
}

impl DeviceType {
    /// Create the Candle device
    pub fn create(self) -> Result<Device> {
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda(idx) => Device::new_cuda(idx)
                .map_err(|e| Error::model(format!("Failed to create CUDA device: {}", e))),
            Self::Metal(idx) => Device::new_metal(idx)
                .map_err(|e| Error::model(format!("Failed to create Metal device: {}", e))),
        }
    }
}

/// Weight file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// SafeTensors format (recommended)
    SafeTensors,
    /// PyTorch state dict
    PyTorch,
}

impl ModelFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("safetensors") => Ok(Self::SafeTensors),
            Some("pt") | Some("pth") | Some("bin") => Ok(Self::PyTorch),
            Some("ptl") => Err(Error::model(format!(
                "{} is a lite-interpreter archive; export the state dict as .safetensors or .pth",
                path.display()
            ))),
            _ => Err(Error::model(format!(
                "Cannot infer model format from {}",
                path.display()
            ))),
        }
    }
}

/// Supported classifier backbones.
///
/// ResNet-18 is the default because it is the usual backbone for a small
/// 224x224 transfer-learned classifier; the published archive does not record
/// its architecture, so set `model.architecture` if your export differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    ResNet18,
    ResNet34,
    ResNet50,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResNet18 => write!(f, "resnet18"),
            Self::ResNet34 => write!(f, "resnet34"),
            Self::ResNet50 => write!(f, "resnet50"),
        }
    }
}

/// Turns a local model file into an inference module
pub trait ModelDeserializer: Send + Sync {
    fn deserialize(&self, path: &Path) -> Result<Arc<dyn InferenceModule>>;
}

/// Builds a candle ResNet classifier from safetensors or PyTorch weights
#[derive(Debug, Clone)]
pub struct CandleResNetDeserializer {
    architecture: Architecture,
    num_classes: usize,
    format: Option<ModelFormat>,
    device: DeviceType,
}

impl CandleResNetDeserializer {
    pub fn new(architecture: Architecture, num_classes: usize) -> Self {
        Self {
            architecture,
            num_classes,
            format: None,
            device: DeviceType::Cpu,
        }
    }

    /// Force a weight format instead of inferring it from the extension
    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    fn var_builder(&self, path: &Path, device: &Device) -> Result<VarBuilder<'static>> {
        let format = match self.format {
            Some(format) => format,
            None => ModelFormat::from_path(path)?,
        };

        match format {
            ModelFormat::SafeTensors => unsafe {
                VarBuilder::from_mmaped_safetensors(&[path.to_path_buf()], DType::F32, device)
                    .map_err(|e| Error::model(format!("Failed to load SafeTensors: {}", e)))
            },
            ModelFormat::PyTorch => VarBuilder::from_pth(path, DType::F32, device)
                .map_err(|e| Error::model(format!("Failed to load PyTorch weights: {}", e))),
        }
    }
}

impl Default for CandleResNetDeserializer {
    fn default() -> Self {
        Self::new(Architecture::ResNet18, crate::ClassLabelTable::builtin().len())
    }
}

impl ModelDeserializer for CandleResNetDeserializer {
    fn deserialize(&self, path: &Path) -> Result<Arc<dyn InferenceModule>> {
        let device = self.device.create()?;
        let vb = self.var_builder(path, &device)?;

        let network = match self.architecture {
            Architecture::ResNet18 => resnet::resnet18(self.num_classes, vb),
            Architecture::ResNet34 => resnet::resnet34(self.num_classes, vb),
            Architecture::ResNet50 => resnet::resnet50(self.num_classes, vb),
        }
        .op("build_network")?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        info!(
            "Built {} '{}' with {} classes",
            self.architecture, name, self.num_classes
        );

        Ok(Arc::new(CandleModule::new(
            name,
            network,
            device,
            self.num_classes,
        )))
    }
}

/// Caller-owned reference to a loaded model
#[derive(Clone)]
pub struct ModelHandle {
    module: Arc<dyn InferenceModule>,
    source: String,
}

impl ModelHandle {
    pub fn new(module: Arc<dyn InferenceModule>, source: impl Into<String>) -> Self {
        Self {
            module,
            source: source.into(),
        }
    }

    pub fn module(&self) -> &Arc<dyn InferenceModule> {
        &self.module
    }

    /// URL the model was loaded from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> &str {
        self.module.name()
    }

    pub fn device(&self) -> &Device {
        self.module.device()
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.module.name())
            .field("source", &self.source)
            .finish()
    }
}

/// Fetches and deserializes one model URL
pub struct ModelLoader {
    url: String,
    fetcher: Arc<dyn ModelFetcher>,
    deserializer: Arc<dyn ModelDeserializer>,
}

impl ModelLoader {
    /// Loader for `url` using the default fetcher and a ResNet-18 deserializer
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fetcher: Arc::new(DefaultFetcher::default()),
            deserializer: Arc::new(CandleResNetDeserializer::default()),
        }
    }

    /// Replace the fetcher
    pub fn with_fetcher(mut self, fetcher: impl ModelFetcher + 'static) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    /// Replace the deserializer
    pub fn with_deserializer(mut self, deserializer: impl ModelDeserializer + 'static) -> Self {
        self.deserializer = Arc::new(deserializer);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the model file and deserialize it.
    ///
    /// Every call fetches and deserializes; use
    /// [`CharacterClassifier::load_model`](crate::CharacterClassifier::load_model)
    /// for load-once semantics.
    pub async fn load(&self) -> Result<ModelHandle> {
        info!("Loading model from {}", self.url);

        let path: PathBuf = self.fetcher.fetch(&self.url).await?;
        info!("Model file resolved to {}", path.display());

        let deserializer = Arc::clone(&self.deserializer);
        let module = tokio::task::spawn_blocking(move || deserializer.deserialize(&path))
            .await
            .map_err(|e| Error::internal(format!("model deserialization task failed: {}", e)))??;

        metrics::counter!("charid_model_loads_total").increment(1);
        info!("Model '{}' loaded", module.name());

        Ok(ModelHandle::new(module, self.url.clone()))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_URL)
    }
}

impl fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelLoader").field("url", &self.url).finish()
    }
}
