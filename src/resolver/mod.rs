//! Model resolution
//!
//! A servable model is located by walking an ordered chain of strategies:
//! a baked-in local path, a registry stage, then the best run of an
//! experiment. The first strategy that produces a model wins.

mod strategies;

pub use strategies::{BestRunStrategy, LocalPathStrategy, RegistryStageStrategy};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TrackingConfig;
use crate::loader::ArtifactLoader;
use crate::model::{Classifier, LoadedModel, ModelOrigin};
use crate::tracking::{TrackingClient, TrackingError};

/// One failed resolution step
#[derive(Debug, Clone)]
pub struct Attempt {
    pub strategy: &'static str,
    pub error: String,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.error)
    }
}

/// Resolution failures
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("local model path {} does not exist", .0.display())]
    LocalPathMissing(PathBuf),

    #[error("failed to load model from {location}: {reason}")]
    Load { location: String, reason: String },

    #[error("tracking server request failed: {0}")]
    Registry(#[from] TrackingError),

    #[error("no version of registered model '{model}' is in stage '{stage}'")]
    NoRegisteredVersion { model: String, stage: String },

    #[error("experiment '{0}' not found; cannot fall back to best run")]
    ExperimentNotFound(String),

    #[error("no runs found in experiment '{0}'")]
    NoRuns(String),

    #[error("no model could be resolved ({})", format_attempts(.0))]
    Exhausted(Vec<Attempt>),
}

fn format_attempts(attempts: &[Attempt]) -> String {
    if attempts.is_empty() {
        return "no source configured".to_string();
    }
    attempts
        .iter()
        .map(Attempt::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A model produced by a strategy
pub struct Resolved {
    pub classifier: Arc<dyn Classifier>,
    pub version: String,
    pub origin: ModelOrigin,
    /// Path or URI the model was loaded from
    pub location: String,
}

impl Resolved {
    pub fn into_loaded(self) -> LoadedModel {
        LoadedModel::new(self.classifier, self.version, self.origin)
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("version", &self.version)
            .field("origin", &self.origin)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// One way of finding a model
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// Short label used in logs and error reports
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the strategy does not apply (nothing configured)
    async fn resolve(&self) -> Result<Option<Resolved>, ResolveError>;
}

/// Ordered chain of strategies
pub struct ModelResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    allow_fallback: bool,
}

impl ModelResolver {
    pub fn new(strategies: Vec<Box<dyn ResolutionStrategy>>, allow_fallback: bool) -> Self {
        Self {
            strategies,
            allow_fallback,
        }
    }

    /// Standard chain: local path, registry stage, best run
    pub fn from_config(
        config: &TrackingConfig,
        loader: Arc<dyn ArtifactLoader>,
    ) -> Result<Self, ResolveError> {
        let client = TrackingClient::new(config)?;

        let strategies: Vec<Box<dyn ResolutionStrategy>> = vec![
            Box::new(LocalPathStrategy::new(
                config.local_path.clone(),
                loader.clone(),
            )),
            Box::new(RegistryStageStrategy::new(
                client.clone(),
                &config.model_name,
                &config.stage,
                config.cache_dir.clone(),
                loader.clone(),
            )),
            Box::new(BestRunStrategy::new(
                client,
                &config.experiment_name,
                &config.ranking_metric,
                config.cache_dir.clone(),
                loader,
            )),
        ];

        Ok(Self::new(strategies, config.allow_fallback))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Walk the chain and return the first model found
    pub async fn resolve(&self) -> Result<Resolved, ResolveError> {
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            match strategy.resolve().await {
                Ok(Some(resolved)) => {
                    tracing::info!(
                        strategy = strategy.name(),
                        version = %resolved.version,
                        location = %resolved.location,
                        "Model resolved"
                    );
                    return Ok(resolved);
                }
                Ok(None) => {
                    tracing::debug!(strategy = strategy.name(), "Resolution step not configured");
                }
                Err(e) => {
                    tracing::warn!(strategy = strategy.name(), error = %e, "Resolution step failed");
                    if !self.allow_fallback {
                        return Err(e);
                    }
                    attempts.push(Attempt {
                        strategy: strategy.name(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Err(ResolveError::Exhausted(attempts))
    }
}
