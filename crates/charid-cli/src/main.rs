//! charid
//!
//! Command-line front end: loads the character model once and classifies
//! image files with it.

use anyhow::{Context, Result};
use charid_vision::{open_image, CharacterClassifier, ImageClassifier, ModelFetcher};
use clap::Parser;
use tracing::{info, warn};

mod cli;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    let config = config::load(&cli.config, &cli)?;
    info!("Model: {}", config.model.url);

    match &cli.command {
        Commands::Classify {
            images,
            mode,
            top_k,
        } => {
            let mut classifier = config.build_classifier()?;
            if let Some(mode) = mode {
                classifier = classifier.with_mode(*mode);
            }

            classifier
                .load_model()
                .await
                .with_context(|| format!("Failed to load model from {}", config.model.url))?;

            classify_all(&classifier, images, *top_k).await
        }
        Commands::Fetch => {
            let path = config.fetcher()?.fetch(&config.model.url).await?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Labels => {
            for (index, label) in config.label_table()?.iter().enumerate() {
                println!("{}\t{}", index, label);
            }
            Ok(())
        }
    }
}

async fn classify_all(
    classifier: &CharacterClassifier,
    images: &[std::path::PathBuf],
    top_k: usize,
) -> Result<()> {
    let mut failures = 0usize;

    for path in images {
        let image = match open_image(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };

        let result = classifier
            .classify(&image)
            .await
            .with_context(|| format!("Failed to classify {}", path.display()))?;

        if top_k <= 1 {
            println!(
                "{}\t{}\t{:.3}\t{}us",
                path.display(),
                result.label,
                result.score,
                result.latency_us
            );
        } else {
            println!("{}", path.display());
            for (label, score) in result.top_k(top_k) {
                println!("  {:<12}{:.3}", label, score);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} images could not be decoded", failures, images.len());
    }
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("charid=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("charid=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
