//! Built-in resolution strategies

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::{ResolutionStrategy, ResolveError, Resolved};
use crate::loader::ArtifactLoader;
use crate::model::{Classifier, ModelOrigin};
use crate::tracking::{cache_key, join_uri, TrackingClient};

/// Name of the model artifact logged under each training run
const RUN_MODEL_ARTIFACT: &str = "model";

/// Load an artifact off the async runtime; graph optimization is CPU-bound
async fn load_blocking(
    loader: &Arc<dyn ArtifactLoader>,
    path: &Path,
) -> Result<Arc<dyn Classifier>, ResolveError> {
    let loader = loader.clone();
    let owned = path.to_path_buf();
    let location = path.display().to_string();

    let result = tokio::task::spawn_blocking(move || loader.load(&owned))
        .await
        .map_err(|e| ResolveError::Load {
            location: location.clone(),
            reason: e.to_string(),
        })?;

    result.map_err(|e| ResolveError::Load {
        location,
        reason: format!("{:#}", e),
    })
}

/// A model file or directory shipped with the deployment
pub struct LocalPathStrategy {
    path: Option<PathBuf>,
    loader: Arc<dyn ArtifactLoader>,
}

impl LocalPathStrategy {
    pub fn new(path: Option<PathBuf>, loader: Arc<dyn ArtifactLoader>) -> Self {
        Self { path, loader }
    }
}

#[async_trait]
impl ResolutionStrategy for LocalPathStrategy {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn resolve(&self) -> Result<Option<Resolved>, ResolveError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        if !path.exists() {
            return Err(ResolveError::LocalPathMissing(path.clone()));
        }

        tracing::info!(path = %path.display(), "Loading model from local path");
        let classifier = load_blocking(&self.loader, path).await?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Some(Resolved {
            classifier,
            version: format!("local:{}", name),
            origin: ModelOrigin::Local,
            location: path.display().to_string(),
        }))
    }
}

/// Latest registered version of a model at a stage
pub struct RegistryStageStrategy {
    client: TrackingClient,
    model_name: String,
    stage: String,
    cache_dir: PathBuf,
    loader: Arc<dyn ArtifactLoader>,
}

impl RegistryStageStrategy {
    pub fn new(
        client: TrackingClient,
        model_name: &str,
        stage: &str,
        cache_dir: PathBuf,
        loader: Arc<dyn ArtifactLoader>,
    ) -> Self {
        Self {
            client,
            model_name: model_name.to_string(),
            stage: stage.to_string(),
            cache_dir,
            loader,
        }
    }
}

#[async_trait]
impl ResolutionStrategy for RegistryStageStrategy {
    fn name(&self) -> &'static str {
        "registry"
    }

    async fn resolve(&self) -> Result<Option<Resolved>, ResolveError> {
        tracing::info!(
            model = %self.model_name,
            stage = %self.stage,
            "Looking up registered model"
        );

        let version = self
            .client
            .latest_version(&self.model_name, &self.stage)
            .await?
            .ok_or_else(|| ResolveError::NoRegisteredVersion {
                model: self.model_name.clone(),
                stage: self.stage.clone(),
            })?;

        let uri = self
            .client
            .download_uri(&self.model_name, &version.version)
            .await?;
        let dest = self
            .cache_dir
            .join(cache_key(&["registry", &self.model_name, &version.version]));
        let path = self.client.fetch_artifact(&uri, &dest).await?;

        let classifier = load_blocking(&self.loader, &path).await?;

        Ok(Some(Resolved {
            classifier,
            version: version.version,
            origin: ModelOrigin::Registry,
            location: uri,
        }))
    }
}

/// Highest-ranked run of an experiment
pub struct BestRunStrategy {
    client: TrackingClient,
    experiment_name: String,
    metric: String,
    cache_dir: PathBuf,
    loader: Arc<dyn ArtifactLoader>,
}

impl BestRunStrategy {
    pub fn new(
        client: TrackingClient,
        experiment_name: &str,
        metric: &str,
        cache_dir: PathBuf,
        loader: Arc<dyn ArtifactLoader>,
    ) -> Self {
        Self {
            client,
            experiment_name: experiment_name.to_string(),
            metric: metric.to_string(),
            cache_dir,
            loader,
        }
    }
}

#[async_trait]
impl ResolutionStrategy for BestRunStrategy {
    fn name(&self) -> &'static str {
        "run"
    }

    async fn resolve(&self) -> Result<Option<Resolved>, ResolveError> {
        tracing::info!(
            experiment = %self.experiment_name,
            metric = %self.metric,
            "Falling back to best run"
        );

        let experiment = self
            .client
            .experiment_by_name(&self.experiment_name)
            .await?
            .ok_or_else(|| ResolveError::ExperimentNotFound(self.experiment_name.clone()))?;

        let run = self
            .client
            .best_run(&experiment.experiment_id, &self.metric)
            .await?
            .ok_or_else(|| ResolveError::NoRuns(self.experiment_name.clone()))?;

        tracing::info!(
            run_id = run.id(),
            score = ?run.metric(&self.metric),
            "Loading model from best run"
        );

        let uri = join_uri(&run.info.artifact_uri, RUN_MODEL_ARTIFACT);
        let dest = self.cache_dir.join(cache_key(&["runs", run.id()]));
        let path = self.client.fetch_artifact(&uri, &dest).await?;

        let classifier = load_blocking(&self.loader, &path).await?;

        Ok(Some(Resolved {
            classifier,
            version: format!("run:{}", run.id()),
            origin: ModelOrigin::Run,
            location: uri,
        }))
    }
}
