//! Classifier trait and common types

use crate::image_input::InputImage;
use async_trait::async_trait;
use charid_core::Result;

/// Trait for image classifiers
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Classify the given image
    async fn classify(&self, image: &(dyn InputImage + Sync)) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;
}

/// Result of classification
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// Classification label
    pub label: String,

    /// Softmax confidence of the label (0.0-1.0)
    pub score: f32,

    /// Additional metadata
    pub metadata: ClassificationMetadata,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Create a new classification result
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
            metadata: ClassificationMetadata::default(),
            latency_us: 0,
        }
    }

    /// The `k` most likely classes, highest first; ties keep table order
    pub fn top_k(&self, k: usize) -> Vec<(String, f32)> {
        let mut scores = self.metadata.all_scores.clone().unwrap_or_else(|| {
            vec![(self.label.clone(), self.score)]
        });
        // Stable sort keeps the lower index first on ties
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        scores.truncate(k);
        scores
    }
}

/// Metadata about classification
#[derive(Debug, Clone, Default)]
pub struct ClassificationMetadata {
    /// Model name or version
    pub model: Option<String>,

    /// Output index the label was taken from
    pub index: Option<usize>,

    /// All class scores, in label table order
    pub all_scores: Option<Vec<(String, f32)>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_scores(scores: &[(&str, f32)]) -> ClassificationResult {
        let mut result = ClassificationResult::new(scores[0].0, scores[0].1);
        result.metadata.all_scores = Some(
            scores
                .iter()
                .map(|(label, score)| (label.to_string(), *score))
                .collect(),
        );
        result
    }

    #[test]
    fn test_top_k_orders_by_score() {
        let result = result_with_scores(&[("Bowser", 0.1), ("Luigi", 0.6), ("Mario", 0.3)]);
        let top = result.top_k(2);
        assert_eq!(top[0].0, "Luigi");
        assert_eq!(top[1].0, "Mario");
    }

    #[test]
    fn test_top_k_ties_keep_table_order() {
        let result = result_with_scores(&[("Bowser", 0.4), ("Luigi", 0.4), ("Mario", 0.2)]);
        let top = result.top_k(3);
        assert_eq!(top[0].0, "Bowser");
        assert_eq!(top[1].0, "Luigi");
    }

    #[test]
    fn test_top_k_without_scores() {
        let result = ClassificationResult::new("Toad", 0.8);
        assert_eq!(result.top_k(5), vec![("Toad".to_string(), 0.8)]);
    }
}
