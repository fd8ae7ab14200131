//! Configuration for model loading and classification

use crate::fetcher::{default_cache_dir, DefaultFetcher, HttpFetcher};
use crate::labels::ClassLabelTable;
use crate::model_loader::{
    Architecture, CandleResNetDeserializer, DeviceType, ModelFormat, ModelLoader,
    DEFAULT_MODEL_URL,
};
use crate::CharacterClassifier;
use charid_core::{Error, InferenceMode, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level classifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Model source and backbone
    #[serde(default)]
    pub model: ModelConfigSpec,

    /// Label file overriding the packaged character table
    #[serde(default)]
    pub labels: Option<PathBuf>,

    /// Model cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Inference settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// HTTP download settings
    #[serde(default)]
    pub http: HttpConfig,
}

/// Model configuration specification (for YAML/config files)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfigSpec {
    /// `https://`, `hf://`, `file://` URL or plain path
    #[serde(default = "default_model_url")]
    pub url: String,

    /// Network backbone
    #[serde(default)]
    pub architecture: Architecture,

    /// Weight format; inferred from the file extension when absent
    #[serde(default)]
    pub format: Option<ModelFormat>,

    /// Device to run on
    #[serde(default)]
    pub device: DeviceSpec,
}

impl Default for ModelConfigSpec {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            architecture: Architecture::default(),
            format: None,
            device: DeviceSpec::default(),
        }
    }
}

/// Device specification (for config files)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda { index: Option<usize> },
    Metal { index: Option<usize> },
}

impl DeviceSpec {
    /// Convert to DeviceType
    pub fn to_device_type(&self) -> DeviceType {
        match self {
            DeviceSpec::Cpu => DeviceType::Cpu,
            DeviceSpec::Cuda { index } => DeviceType::Cuda(index.unwrap_or(0)),
            DeviceSpec::Metal { index } => DeviceType::Metal(index.unwrap_or(0)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub mode: InferenceMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Download timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClassifierConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Invalid classifier config: {}", e)))
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Effective cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Label table from the configured file, or the packaged one
    pub fn label_table(&self) -> Result<ClassLabelTable> {
        match &self.labels {
            Some(path) => ClassLabelTable::from_file(path),
            None => Ok(ClassLabelTable::builtin()),
        }
    }

    /// Fetcher honoring the cache directory and timeout
    pub fn fetcher(&self) -> Result<DefaultFetcher> {
        let http = HttpFetcher::new(self.cache_dir())
            .with_timeout(Duration::from_secs(self.http.timeout_secs))?;
        Ok(DefaultFetcher::new(http))
    }

    /// Loader sized for `num_classes` outputs
    pub fn model_loader(&self, num_classes: usize) -> Result<ModelLoader> {
        let mut deserializer = CandleResNetDeserializer::new(self.model.architecture, num_classes)
            .with_device(self.model.device.to_device_type());
        if let Some(format) = self.model.format {
            deserializer = deserializer.with_format(format);
        }

        Ok(ModelLoader::new(self.model.url.clone())
            .with_fetcher(self.fetcher()?)
            .with_deserializer(deserializer))
    }

    /// Build an unloaded classifier
    pub fn build_classifier(&self) -> Result<CharacterClassifier> {
        let labels = self.label_table()?;
        let loader = self.model_loader(labels.len())?;
        Ok(CharacterClassifier::new(loader, labels).with_mode(self.inference.mode))
    }
}

fn default_model_url() -> String {
    DEFAULT_MODEL_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_config_yaml() {
        let yaml = r#"
model:
  url: hf://raedle/super-mario/model.safetensors
  architecture: resnet34
  format: safetensors
  device:
    cuda:
      index: 1
labels: ./classes.json
cache_dir: ./my-models
inference:
  mode: blocking
http:
  timeout_secs: 30
"#;

        let config = ClassifierConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.model.url, "hf://raedle/super-mario/model.safetensors");
        assert_eq!(config.model.architecture, Architecture::ResNet34);
        assert_eq!(config.model.format, Some(ModelFormat::SafeTensors));
        assert!(matches!(config.model.device.to_device_type(), DeviceType::Cuda(1)));
        assert_eq!(config.cache_dir(), PathBuf::from("./my-models"));
        assert_eq!(config.inference.mode, InferenceMode::Blocking);
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_defaults() {
        let config = ClassifierConfig::from_yaml("{}").unwrap();

        assert_eq!(config.model.url, DEFAULT_MODEL_URL);
        assert_eq!(config.model.architecture, Architecture::ResNet18);
        assert!(config.model.format.is_none());
        assert!(matches!(config.model.device, DeviceSpec::Cpu));
        assert_eq!(config.inference.mode, InferenceMode::Offloaded);
        assert_eq!(config.http.timeout_secs, 300);
        assert_eq!(config.label_table().unwrap().len(), 5);
    }

    #[test]
    fn test_device_spec() {
        let spec: DeviceSpec = serde_yaml::from_str("cpu").unwrap();
        assert!(matches!(spec, DeviceSpec::Cpu));

        let metal_device = DeviceSpec::Metal { index: None }.to_device_type();
        assert!(matches!(metal_device, DeviceType::Metal(0)));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = ClassifierConfig::from_yaml("model: [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_build_classifier_uses_custom_labels() {
        let dir = tempfile::tempdir().unwrap();
        let labels = dir.path().join("classes.json");
        std::fs::write(&labels, r#"["Yoshi", "Wario", "Daisy"]"#).unwrap();

        let config = ClassifierConfig {
            labels: Some(labels),
            cache_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let classifier = config.build_classifier().unwrap();
        assert_eq!(classifier.labels().len(), 3);
        assert!(!classifier.is_loaded());
    }
}
