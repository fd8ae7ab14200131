//! CLI configuration: config file plus flag overrides

use crate::cli::Cli;
use charid_vision::ClassifierConfig;
use std::path::Path;

/// Load configuration from file and CLI overrides
pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<ClassifierConfig> {
    // Try to load from file, or use defaults
    let mut config = if Path::new(config_path).exists() {
        ClassifierConfig::from_file(config_path)?
    } else {
        ClassifierConfig::default()
    };

    // Apply CLI overrides
    if let Some(url) = &cli.model_url {
        config.model.url = url.clone();
    }

    if let Some(labels) = &cli.labels {
        config.labels = Some(labels.clone());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_missing_file_uses_defaults() {
        let cli = Cli::try_parse_from(["charid", "labels"]).unwrap();
        let config = load("/no/such/charid.yaml", &cli).unwrap();
        assert_eq!(config.model.url, charid_vision::DEFAULT_MODEL_URL);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charid.yaml");
        std::fs::write(&path, "model:\n  url: https://example.com/a.safetensors\n").unwrap();

        let cli = Cli::try_parse_from([
            "charid",
            "--model-url",
            "/models/b.safetensors",
            "--labels",
            "classes.json",
            "fetch",
        ])
        .unwrap();

        let config = load(path.to_str().unwrap(), &cli).unwrap();
        assert_eq!(config.model.url, "/models/b.safetensors");
        assert_eq!(config.labels.as_deref(), Some(Path::new("classes.json")));
    }
}
