//! charid Vision
//!
//! Identifies the video-game character in an image with a pre-trained
//! classifier.
//!
//! The flow is a model loader followed by a fixed pipeline:
//! - fetch the weight file ([`ModelFetcher`]) and deserialize it into an
//!   [`InferenceModule`] wrapped by a [`ModelHandle`]
//! - preprocess the image into a `[1, 3, 224, 224]` tensor
//! - run the forward pass and map the arg-max index through the
//!   [`ClassLabelTable`]
//!
//! Tensor math and inference are delegated to Candle.

pub mod character;
pub mod classifier;
pub mod config;
pub mod fetcher;
pub mod image_input;
pub mod inference;
pub mod labels;
pub mod model_loader;
pub mod preprocess;
pub mod tensor;

pub use character::{classify_with, classify_with_blocking, CharacterClassifier};
pub use classifier::{ClassificationMetadata, ClassificationResult, ImageClassifier};
pub use config::{ClassifierConfig, DeviceSpec, ModelConfigSpec};
pub use fetcher::{DefaultFetcher, FnFetcher, HttpFetcher, LocalFetcher, ModelFetcher};
#[cfg(feature = "hf-hub")]
pub use fetcher::HfHubFetcher;
pub use image_input::{open_image, InputImage};
pub use inference::{run_forward, InferenceModule};
pub use labels::{argmax, ClassLabelTable};
pub use model_loader::{
    Architecture, CandleResNetDeserializer, DeviceType, ModelDeserializer, ModelFormat,
    ModelHandle, ModelLoader, DEFAULT_MODEL_URL, PUBLISHED_MODEL_URL,
};
pub use preprocess::ImagePreprocessor;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::character::CharacterClassifier;
    pub use crate::classifier::{ClassificationResult, ImageClassifier};
    pub use crate::fetcher::ModelFetcher;
    pub use crate::image_input::InputImage;
    pub use crate::labels::ClassLabelTable;
    pub use crate::model_loader::{ModelHandle, ModelLoader};
    pub use charid_core::{Error, InferenceMode, Result};
}
