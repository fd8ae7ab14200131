//! Inference modules and forward-pass strategies

use crate::tensor::TensorResultExt;
use candle_core::{Device, Tensor};
use candle_nn::{Func, Module};
use charid_core::{Error, InferenceMode, Result};
use std::sync::Arc;

/// A deserialized model that can run a forward pass.
///
/// Implementations own their weights; the runtime behind them is opaque to
/// the classification pipeline.
pub trait InferenceModule: Send + Sync {
    /// Run the model on an `[N, 3, 224, 224]` input, returning `[N, K]` scores
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    /// Model name or identifier
    fn name(&self) -> &str;

    /// Device the weights live on; inputs are built on the same device
    fn device(&self) -> &Device;
}

/// Run the forward pass with the given strategy.
///
/// `Blocking` runs on the calling thread. `Offloaded` moves the call to the
/// tokio blocking pool and awaits it.
pub async fn run_forward(
    module: Arc<dyn InferenceModule>,
    input: Tensor,
    mode: InferenceMode,
) -> Result<Tensor> {
    match mode {
        InferenceMode::Blocking => module.forward(&input),
        InferenceMode::Offloaded => tokio::task::spawn_blocking(move || module.forward(&input))
            .await
            .map_err(|e| Error::inference(format!("forward task failed: {}", e)))?,
    }
}

/// Flatten a `[1, K]` (or `[K]`) output into scores
pub fn output_scores(output: &Tensor) -> Result<Vec<f32>> {
    let scores = match output.dims() {
        [1, _] => output.squeeze(0).op("squeeze")?,
        [_] => output.clone(),
        other => {
            return Err(Error::inference(format!(
                "expected model output of shape [1, K], got {:?}",
                other
            )))
        }
    };

    scores
        .to_dtype(candle_core::DType::F32)
        .and_then(|t| t.to_vec1::<f32>())
        .op("to_vec1")
}

/// Softmax over raw scores, used for reporting confidences
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().filter(|v| !v.is_nan()).sum();

    if sum <= 0.0 || !sum.is_finite() {
        return vec![0.0; scores.len()];
    }
    exps.iter().map(|v| v / sum).collect()
}

/// Candle network built from a weight file
pub struct CandleModule {
    name: String,
    network: Func<'static>,
    device: Device,
    num_classes: usize,
}

impl CandleModule {
    pub fn new(
        name: impl Into<String>,
        network: Func<'static>,
        device: Device,
        num_classes: usize,
    ) -> Self {
        Self {
            name: name.into(),
            network,
            device,
            num_classes,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl InferenceModule for CandleModule {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let output = self.network.forward(input).op("forward")?;

        match output.dims().last() {
            Some(&k) if k == self.num_classes => Ok(output),
            _ => Err(Error::inference(format!(
                "'{}' produced output {:?}, expected {} classes",
                self.name,
                output.dims(),
                self.num_classes
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    fn mean_pool_module() -> Arc<dyn InferenceModule> {
        // [N, C, H, W] -> [N, C]
        let network = Func::new(|xs: &Tensor| xs.mean((2, 3)));
        Arc::new(CandleModule::new("mean-pool", network, Device::Cpu, 3))
    }

    #[tokio::test]
    async fn test_blocking_and_offloaded_agree() {
        let input = Tensor::ones((1, 3, 4, 4), DType::F32, &Device::Cpu).unwrap();
        let module = mean_pool_module();

        let blocking = run_forward(module.clone(), input.clone(), InferenceMode::Blocking)
            .await
            .unwrap();
        let offloaded = run_forward(module, input, InferenceMode::Offloaded)
            .await
            .unwrap();

        assert_eq!(output_scores(&blocking).unwrap(), vec![1.0, 1.0, 1.0]);
        assert_eq!(output_scores(&offloaded).unwrap(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_output_scores_rejects_batch() {
        let output = Tensor::zeros((2, 5), DType::F32, &Device::Cpu).unwrap();
        assert!(output_scores(&output).is_err());
    }

    #[test]
    fn test_softmax() {
        let probs = softmax(&[1.0, 1.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);

        let probs = softmax(&[0.0, 10.0, 0.0]);
        assert!(probs[1] > 0.99);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_candle_module_checks_class_count() {
        let module = CandleModule::new("m", Func::new(|xs: &Tensor| xs.mean((2, 3))), Device::Cpu, 5);
        assert_eq!(module.name(), "m");
        assert_eq!(module.num_classes(), 5);
        assert!(module.device().is_cpu());

        // mean over spatial dims of [1, 3, 4, 4] gives [1, 3], not [1, 5]
        let input = Tensor::ones((1, 3, 4, 4), DType::F32, &Device::Cpu).unwrap();
        let err = module.forward(&input).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));

        let input = Tensor::ones((1, 5, 4, 4), DType::F32, &Device::Cpu).unwrap();
        assert_eq!(module.forward(&input).unwrap().dims(), &[1, 5]);
    }
}
