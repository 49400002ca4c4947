//! Model resolution command

use std::sync::Arc;

use anyhow::Result;

use crate::config::AppConfig;
use crate::loader::OnnxLoader;
use crate::resolver::ModelResolver;

/// Resolve a model once and print where it came from
pub async fn resolve(config: AppConfig) -> Result<()> {
    let resolver = ModelResolver::from_config(&config.tracking, Arc::new(OnnxLoader))?;
    println!("Resolution order: {}", resolver.strategy_names().join(" -> "));
    println!("Registry model:   {}", config.tracking.model_uri());
    println!(
        "Fallback: {}\n",
        if config.tracking.allow_fallback { "enabled" } else { "disabled" }
    );

    let resolved = resolver.resolve().await?;
    println!("Location: {}", resolved.location);

    let model = resolved.into_loaded();
    println!("Source:   {}", model.origin());
    println!("Version:  {}", model.version());
    println!("Loaded:   {}", model.loaded_at().to_rfc3339());

    Ok(())
}
