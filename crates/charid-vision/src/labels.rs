//! Class label table and arg-max lookup

use charid_core::{Error, Result};
use std::path::Path;

/// Packaged Super Mario character table, index-aligned with the default model output
const BUILTIN_CLASSES: &str = include_str!("../resources/character_classes.json");

/// Ordered, immutable list of class names.
///
/// Output index `i` of the model corresponds to entry `i` of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelTable {
    labels: Vec<String>,
}

impl ClassLabelTable {
    /// Create a table from an ordered list of labels
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::labels("label table must contain at least one class"));
        }
        Ok(Self { labels })
    }

    /// The packaged character table
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_CLASSES).expect("packaged character table is valid JSON")
    }

    /// Parse a JSON array of strings
    pub fn from_json(json: &str) -> Result<Self> {
        let labels: Vec<String> = serde_json::from_str(json)?;
        Self::new(labels)
    }

    /// Load a JSON label file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::labels(format!("Failed to read label file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Label at the given output index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Map a score vector to the label of its highest entry
    pub fn lookup_argmax(&self, scores: &[f32]) -> Result<&str> {
        if scores.len() != self.labels.len() {
            return Err(Error::inference(format!(
                "model produced {} scores but the label table has {} classes",
                scores.len(),
                self.labels.len()
            )));
        }

        let index = argmax(scores)
            .ok_or_else(|| Error::inference("model output contains no comparable scores"))?;

        self.get(index)
            .ok_or_else(|| Error::internal(format!("argmax index {} out of range", index)))
    }
}

impl Default for ClassLabelTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Index of the largest value; the first occurrence wins on ties.
///
/// NaN scores are skipped, so a single NaN never wins. This differs from
/// `torch.argmax`, which treats NaN as the maximum; an all-NaN input yields
/// `None`.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }

    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let table = ClassLabelTable::builtin();
        assert_eq!(table.len(), 5);
        assert_eq!(table.get(0), Some("Bowser"));
        assert_eq!(table.get(2), Some("Mario"));
        assert_eq!(table.get(5), None);
    }

    #[test]
    fn test_argmax_first_max_wins() {
        assert_eq!(argmax(&[0.1, 0.9, 0.05, 0.0, 0.0]), Some(1));
        assert_eq!(argmax(&[0.2, 0.7, 0.7, 0.1]), Some(1));
        assert_eq!(argmax(&[3.0, 3.0, 3.0]), Some(0));
    }

    #[test]
    fn test_argmax_skips_nan() {
        assert_eq!(argmax(&[f32::NAN, 0.3, 0.2]), Some(1));
        assert_eq!(argmax(&[f32::NAN, f32::NAN]), None);
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_argmax_negative_logits() {
        assert_eq!(argmax(&[-4.0, -1.5, -2.0]), Some(1));
    }

    #[test]
    fn test_lookup_argmax() {
        let table = ClassLabelTable::builtin();
        assert_eq!(table.lookup_argmax(&[0.1, 0.9, 0.05, 0.0, 0.0]).unwrap(), "Luigi");
    }

    #[test]
    fn test_lookup_argmax_length_mismatch() {
        let table = ClassLabelTable::builtin();
        let err = table.lookup_argmax(&[0.1, 0.9]).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_from_json_rejects_empty() {
        assert!(ClassLabelTable::from_json("[]").is_err());
        assert!(ClassLabelTable::from_json("{\"a\": 1}").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.json");
        std::fs::write(&path, r#"["Yoshi", "Wario"]"#).unwrap();

        let table = ClassLabelTable::from_file(&path).unwrap();
        assert_eq!(table.iter().collect::<Vec<_>>(), vec!["Yoshi", "Wario"]);
    }
}
