//! Mock fetchers, deserializers and inference modules for testing
//!
//! Provides configurable test doubles for the loader seams so the pipeline can
//! be exercised without network access or real weights.

#![allow(dead_code)]

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use charid_core::{Error, Result};
use charid_vision::{InferenceModule, ModelDeserializer, ModelFetcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A fetcher that resolves every URL to a fixed path and counts calls
pub struct MockFetcher {
    path: PathBuf,
    simulated_latency: Option<Duration>,
    failures_remaining: AtomicU32,
    call_count: AtomicU32,
}

impl MockFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            simulated_latency: None,
            failures_remaining: AtomicU32::new(0),
            call_count: AtomicU32::new(0),
        }
    }

    /// Set simulated latency for each fetch
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency = Some(latency);
        self
    }

    /// Fail the first `n` fetches
    pub fn failing_first(self, n: u32) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Get the number of times fetch was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.simulated_latency {
            tokio::time::sleep(latency).await;
        }

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::fetch(format!("simulated download failure for {}", url)));
        }

        Ok(self.path.clone())
    }
}

/// Lets a test keep its own handle on a fetcher it gives to a loader
pub struct SharedFetcher(pub Arc<MockFetcher>);

#[async_trait]
impl ModelFetcher for SharedFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        self.0.fetch(url).await
    }
}

/// An inference module returning fixed scores and recording input shapes
pub struct FixedOutputModule {
    scores: Vec<f32>,
    device: Device,
    seen_shapes: Mutex<Vec<Vec<usize>>>,
}

impl FixedOutputModule {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            device: Device::Cpu,
            seen_shapes: Mutex::new(Vec::new()),
        }
    }

    /// Shapes of every tensor passed to forward
    pub fn seen_shapes(&self) -> Vec<Vec<usize>> {
        self.seen_shapes.lock().unwrap().clone()
    }
}

impl InferenceModule for FixedOutputModule {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.seen_shapes.lock().unwrap().push(input.dims().to_vec());
        Tensor::from_vec(self.scores.clone(), (1, self.scores.len()), &self.device)
            .map_err(|e| Error::tensor("mock_forward", e))
    }

    fn name(&self) -> &str {
        "fixed-output"
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

/// An inference module that always fails
pub struct FailingModule {
    device: Device,
}

impl FailingModule {
    pub fn new() -> Self {
        Self {
            device: Device::Cpu,
        }
    }
}

impl InferenceModule for FailingModule {
    fn forward(&self, _input: &Tensor) -> Result<Tensor> {
        Err(Error::inference("Simulated interpreter failure"))
    }

    fn name(&self) -> &str {
        "failing"
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

/// A deserializer handing out a prepared module and counting calls
pub struct MockDeserializer {
    module: Option<Arc<dyn InferenceModule>>,
    call_count: Arc<AtomicU32>,
    seen_paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockDeserializer {
    pub fn returning(module: Arc<dyn InferenceModule>) -> Self {
        Self {
            module: Some(module),
            call_count: Arc::new(AtomicU32::new(0)),
            seen_paths: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A deserializer that rejects every file
    pub fn failing() -> Self {
        Self {
            module: None,
            call_count: Arc::new(AtomicU32::new(0)),
            seen_paths: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Counter shared with clones handed to a loader
    pub fn counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.call_count)
    }

    pub fn paths(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.seen_paths)
    }
}

impl ModelDeserializer for MockDeserializer {
    fn deserialize(&self, path: &Path) -> Result<Arc<dyn InferenceModule>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.seen_paths.lock().unwrap().push(path.to_path_buf());

        self.module
            .clone()
            .ok_or_else(|| Error::model(format!("Simulated parse failure for {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    #[tokio::test]
    async fn test_mock_fetcher_counts_calls() {
        let fetcher = MockFetcher::new("/models/m.safetensors");

        assert_eq!(fetcher.fetch("u").await.unwrap(), PathBuf::from("/models/m.safetensors"));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_fetcher_failures() {
        let fetcher = MockFetcher::new("/m").failing_first(1);

        assert!(fetcher.fetch("u").await.is_err());
        assert!(fetcher.fetch("u").await.is_ok());
        assert_eq!(fetcher.call_count(), 2);
    }

    #[test]
    fn test_fixed_output_module() {
        let module = FixedOutputModule::new(vec![0.2, 0.8]);
        let input = Tensor::zeros((1, 3, 224, 224), DType::F32, &Device::Cpu).unwrap();

        let output = module.forward(&input).unwrap();
        assert_eq!(output.dims(), &[1, 2]);
        assert_eq!(module.seen_shapes(), vec![vec![1, 3, 224, 224]]);
    }

    #[test]
    fn test_failing_deserializer() {
        let deserializer = MockDeserializer::failing();
        assert!(deserializer.deserialize(Path::new("/m")).is_err());
        assert_eq!(deserializer.counter().load(Ordering::SeqCst), 1);
    }
}
