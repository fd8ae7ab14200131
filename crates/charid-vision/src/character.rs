//! Video-game character classification
//!
//! [`CharacterClassifier`] owns a [`ModelLoader`], the class table and at most
//! one loaded [`ModelHandle`]. Loading is idempotent and classification fails
//! with [`Error::ModelNotLoaded`] until a load has succeeded.

use crate::classifier::{ClassificationMetadata, ClassificationResult, ImageClassifier};
use crate::image_input::InputImage;
use crate::inference::{output_scores, run_forward, softmax, InferenceModule};
use crate::labels::{argmax, ClassLabelTable};
use crate::model_loader::{ModelHandle, ModelLoader};
use crate::preprocess::ImagePreprocessor;
use async_trait::async_trait;
use candle_core::Tensor;
use charid_core::{Error, InferenceMode, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Classify one image with an explicit model handle
pub async fn classify_with<I: InputImage + ?Sized>(
    handle: &ModelHandle,
    labels: &ClassLabelTable,
    image: &I,
    mode: InferenceMode,
) -> Result<ClassificationResult> {
    let start = Instant::now();
    let input = prepare_input(handle, image)?;
    let output = run_forward(Arc::clone(handle.module()), input, mode).await?;
    summarize(handle, labels, &output, start)
}

/// Classify one image with an explicit model handle, running the forward pass
/// on the calling thread
pub fn classify_with_blocking<I: InputImage + ?Sized>(
    handle: &ModelHandle,
    labels: &ClassLabelTable,
    image: &I,
) -> Result<ClassificationResult> {
    let start = Instant::now();
    let input = prepare_input(handle, image)?;
    let output = handle.module().forward(&input)?;
    summarize(handle, labels, &output, start)
}

fn prepare_input<I: InputImage + ?Sized>(handle: &ModelHandle, image: &I) -> Result<Tensor> {
    ImagePreprocessor::new(handle.device().clone()).process(image)
}

fn summarize(
    handle: &ModelHandle,
    labels: &ClassLabelTable,
    output: &Tensor,
    start: Instant,
) -> Result<ClassificationResult> {
    let scores = output_scores(output)?;
    let label = labels.lookup_argmax(&scores)?.to_string();
    let index = argmax(&scores);
    let probs = softmax(&scores);
    let score = index.and_then(|i| probs.get(i).copied()).unwrap_or(0.0);

    let latency_us = start.elapsed().as_micros() as u64;
    metrics::counter!("charid_classifications_total", "label" => label.clone()).increment(1);
    metrics::histogram!("charid_inference_latency_us").record(latency_us as f64);
    debug!(label = %label, score, latency_us, "Classified image");

    Ok(ClassificationResult {
        label,
        score,
        metadata: ClassificationMetadata {
            model: Some(handle.name().to_string()),
            index,
            all_scores: Some(labels.iter().map(str::to_string).zip(probs).collect()),
        },
        latency_us,
    })
}

/// Loads the character model once and classifies images with it
pub struct CharacterClassifier {
    name: String,
    loader: ModelLoader,
    labels: ClassLabelTable,
    mode: InferenceMode,
    model: OnceCell<ModelHandle>,
}

impl CharacterClassifier {
    /// Create an unloaded classifier
    pub fn new(loader: ModelLoader, labels: ClassLabelTable) -> Self {
        Self {
            name: "character".to_string(),
            loader,
            labels,
            mode: InferenceMode::default(),
            model: OnceCell::new(),
        }
    }

    /// Create a classifier around an already loaded handle
    pub fn with_handle(loader: ModelLoader, labels: ClassLabelTable, handle: ModelHandle) -> Self {
        Self {
            model: OnceCell::new_with(Some(handle)),
            ..Self::new(loader, labels)
        }
    }

    /// Set the forward-pass strategy used by [`classify_image`](Self::classify_image)
    pub fn with_mode(mut self, mode: InferenceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Ensure the model is loaded.
    ///
    /// Returns immediately once a handle exists. Concurrent first calls share
    /// one fetch and deserialize. On failure nothing is stored and a later call
    /// retries.
    pub async fn load_model(&self) -> Result<()> {
        if self.model.initialized() {
            debug!("Model already loaded, skipping");
            return Ok(());
        }

        let handle = self.model.get_or_try_init(|| self.loader.load()).await?;
        info!("Classifier '{}' ready with model '{}'", self.name, handle.name());
        Ok(())
    }

    /// The loaded model, if any
    pub fn handle(&self) -> Option<&ModelHandle> {
        self.model.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    pub fn labels(&self) -> &ClassLabelTable {
        &self.labels
    }

    pub fn mode(&self) -> InferenceMode {
        self.mode
    }

    fn loaded(&self) -> Result<&ModelHandle> {
        self.model.get().ok_or(Error::ModelNotLoaded)
    }

    /// Label of the character in the image; the forward pass runs on the blocking pool
    pub async fn classify_character<I: InputImage + ?Sized>(&self, image: &I) -> Result<String> {
        let handle = self.loaded()?;
        classify_with(handle, &self.labels, image, InferenceMode::Offloaded)
            .await
            .map(|r| r.label)
    }

    /// Label of the character in the image; the forward pass runs on the calling thread
    pub fn classify_character_sync<I: InputImage + ?Sized>(&self, image: &I) -> Result<String> {
        self.classify_blocking(image).map(|r| r.label)
    }

    /// Full result using the configured inference mode
    pub async fn classify_image<I: InputImage + ?Sized>(
        &self,
        image: &I,
    ) -> Result<ClassificationResult> {
        let handle = self.loaded()?;
        classify_with(handle, &self.labels, image, self.mode).await
    }

    /// Full result with the forward pass on the calling thread
    pub fn classify_blocking<I: InputImage + ?Sized>(
        &self,
        image: &I,
    ) -> Result<ClassificationResult> {
        let handle = self.loaded()?;
        classify_with_blocking(handle, &self.labels, image)
    }
}

impl std::fmt::Debug for CharacterClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacterClassifier")
            .field("name", &self.name)
            .field("loader", &self.loader)
            .field("classes", &self.labels.len())
            .field("mode", &self.mode)
            .field("model", &self.model.get())
            .finish()
    }
}

#[async_trait]
impl ImageClassifier for CharacterClassifier {
    async fn classify(&self, image: &(dyn InputImage + Sync)) -> Result<ClassificationResult> {
        self.classify_image(image).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
