//! Offline prediction command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::loader::OnnxLoader;
use crate::preprocess;
use crate::resolver::ModelResolver;

/// Classify an image file from disk
pub async fn predict(config: AppConfig, image: PathBuf, json: bool) -> Result<()> {
    let bytes = tokio::fs::read(&image)
        .await
        .with_context(|| format!("failed to read image {}", image.display()))?;
    let tensor = preprocess::normalize_bytes(&bytes, &config.preprocess)?;

    let resolver = ModelResolver::from_config(&config.tracking, Arc::new(OnnxLoader))?;
    let model = resolver.resolve().await?.into_loaded();
    let version = model.version().to_string();

    let prediction = tokio::task::spawn_blocking(move || model.predict(&tensor)).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
        return Ok(());
    }

    println!("Image:      {}", image.display());
    println!("Model:      {} (version {})", config.tracking.model_name, version);
    println!("Prediction: {}", prediction.prediction);
    println!("Confidence: {:.4}", prediction.confidence);
    println!("\nProbabilities:");
    for (digit, p) in prediction.probabilities.iter().enumerate() {
        let marker = if digit == prediction.prediction as usize { " <" } else { "" };
        println!("  {}: {:.4}{}", digit, p, marker);
    }

    Ok(())
}
