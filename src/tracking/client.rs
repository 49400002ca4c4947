//! HTTP client for the MLflow REST API

use std::path::{Path, PathBuf};

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::artifacts::{join_uri, ArtifactUri};
use super::types::{
    CreateModelVersionRequest, DownloadUriResponse, ErrorBody, Experiment, ExperimentResponse,
    FileInfo, LatestVersionsResponse, ListArtifactsResponse, ModelVersion, ModelVersionResponse,
    Run, RunResponse, SearchRunsRequest, SearchRunsResponse, TransitionStageRequest,
};
use super::TrackingError;
use crate::config::TrackingConfig;

/// Written once an artifact tree has been fully downloaded
const COMPLETE_MARKER: &str = ".digitserve-complete";

/// MLflow tracking server client
#[derive(Debug, Clone)]
pub struct TrackingClient {
    client: Client,
    base: String,
}

impl TrackingClient {
    /// Create a client for the configured tracking URI
    pub fn new(config: &TrackingConfig) -> Result<Self, TrackingError> {
        let base = config.uri.trim_end_matches('/').to_string();
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(format!("digitserve/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| TrackingError::Http {
                url: base.clone(),
                source,
            })?;

        Ok(Self { client, base })
    }

    pub fn base_uri(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base, path)
    }

    fn artifacts_url(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow-artifacts/artifacts/{}", self.base, path)
    }

    async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T, TrackingError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| TrackingError::Http {
                url: url.clone(),
                source,
            })?;
        handle_response(url, resp).await
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, TrackingError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| TrackingError::Http {
                url: url.clone(),
                source,
            })?;
        handle_response(url, resp).await
    }

    /// Latest version of a registered model at a stage, if any
    pub async fn latest_version(
        &self,
        name: &str,
        stage: &str,
    ) -> Result<Option<ModelVersion>, TrackingError> {
        let result: Result<LatestVersionsResponse, _> = self
            .get(
                "registered-models/get-latest-versions",
                &[("name", name), ("stages", stage)],
            )
            .await;

        match result {
            Ok(resp) => Ok(resp
                .model_versions
                .into_iter()
                .filter(|v| v.current_stage.as_deref().map_or(true, |s| s.eq_ignore_ascii_case(stage)))
                .max_by_key(|v| v.version.parse::<u64>().unwrap_or(0))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Storage URI of a model version's artifacts
    pub async fn download_uri(&self, name: &str, version: &str) -> Result<String, TrackingError> {
        let resp: DownloadUriResponse = self
            .get(
                "model-versions/get-download-uri",
                &[("name", name), ("version", version)],
            )
            .await?;
        Ok(resp.artifact_uri)
    }

    /// Look up an experiment by name
    pub async fn experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, TrackingError> {
        let result: Result<ExperimentResponse, _> = self
            .get("experiments/get-by-name", &[("experiment_name", name)])
            .await;

        match result {
            Ok(resp) => Ok(Some(resp.experiment)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Highest-scoring runs of an experiment by a metric, best first
    pub async fn top_runs(
        &self,
        experiment_id: &str,
        metric: &str,
        max_results: u32,
    ) -> Result<Vec<Run>, TrackingError> {
        let request = SearchRunsRequest {
            experiment_ids: vec![experiment_id],
            order_by: vec![format!("metrics.{} DESC", metric)],
            max_results,
        };
        let resp: SearchRunsResponse = self.post("runs/search", &request).await?;
        Ok(resp.runs)
    }

    /// Best run of an experiment by a metric
    pub async fn best_run(&self, experiment_id: &str, metric: &str) -> Result<Option<Run>, TrackingError> {
        Ok(self.top_runs(experiment_id, metric, 1).await?.into_iter().next())
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Run, TrackingError> {
        let resp: RunResponse = self.get("runs/get", &[("run_id", run_id)]).await?;
        Ok(resp.run)
    }

    /// Whether a registered model with this name exists
    pub async fn registered_model_exists(&self, name: &str) -> Result<bool, TrackingError> {
        let result: Result<serde_json::Value, _> =
            self.get("registered-models/get", &[("name", name)]).await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn create_registered_model(&self, name: &str) -> Result<(), TrackingError> {
        let _: serde_json::Value = self
            .post("registered-models/create", &serde_json::json!({ "name": name }))
            .await?;
        Ok(())
    }

    /// Register an artifact as a new version of a model
    pub async fn create_model_version(
        &self,
        name: &str,
        source: &str,
        run_id: &str,
    ) -> Result<ModelVersion, TrackingError> {
        let request = CreateModelVersionRequest { name, source, run_id };
        let resp: ModelVersionResponse = self.post("model-versions/create", &request).await?;
        Ok(resp.model_version)
    }

    /// Move a model version to a stage
    pub async fn transition_stage(
        &self,
        name: &str,
        version: &str,
        stage: &str,
        archive_existing_versions: bool,
    ) -> Result<ModelVersion, TrackingError> {
        let request = TransitionStageRequest {
            name,
            version,
            stage,
            archive_existing_versions,
        };
        let resp: ModelVersionResponse = self
            .post("model-versions/transition-stage", &request)
            .await?;
        Ok(resp.model_version)
    }

    /// List one level of the proxied artifact store
    pub async fn list_artifacts(&self, path: &str) -> Result<Vec<FileInfo>, TrackingError> {
        let url = format!("{}/api/2.0/mlflow-artifacts/artifacts", self.base);
        let resp = self
            .client
            .get(&url)
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|source| TrackingError::Http {
                url: url.clone(),
                source,
            })?;
        let listing: ListArtifactsResponse = handle_response(url, resp).await?;
        Ok(listing.files)
    }

    async fn download_file(&self, path: &str, target: &Path) -> Result<u64, TrackingError> {
        let url = self.artifacts_url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| TrackingError::Http {
                url: url.clone(),
                source,
            })?;
        let resp = check_status(&url, resp).await?;
        let bytes = resp.bytes().await.map_err(|source| TrackingError::Http {
            url: url.clone(),
            source,
        })?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TrackingError::io(parent, e))?;
        }
        tokio::fs::write(target, &bytes)
            .await
            .map_err(|e| TrackingError::io(target, e))?;

        tracing::debug!(path, bytes = bytes.len(), "Downloaded artifact file");
        Ok(bytes.len() as u64)
    }

    /// Make an artifact available on the local filesystem.
    ///
    /// Local URIs are returned in place; remote trees are downloaded into
    /// `dest`, which is reused when a previous download completed.
    pub async fn fetch_artifact(&self, uri: &str, dest: &Path) -> Result<PathBuf, TrackingError> {
        let parsed = match ArtifactUri::parse(uri)? {
            ArtifactUri::Run { run_id, path } => {
                let run = self.get_run(&run_id).await?;
                let resolved = join_uri(&run.info.artifact_uri, &path);
                match ArtifactUri::parse(&resolved)? {
                    ArtifactUri::Run { .. } => return Err(TrackingError::UnsupportedUri(resolved)),
                    other => other,
                }
            }
            other => other,
        };

        match parsed {
            ArtifactUri::Local(path) => {
                if path.exists() {
                    Ok(path)
                } else {
                    Err(TrackingError::io(
                        &path,
                        std::io::Error::new(std::io::ErrorKind::NotFound, "artifact does not exist"),
                    ))
                }
            }
            ArtifactUri::Proxied(root) => self.download_tree(&root, dest).await,
            ArtifactUri::Run { .. } => Err(TrackingError::UnsupportedUri(uri.to_string())),
        }
    }

    async fn download_tree(&self, root: &str, dest: &Path) -> Result<PathBuf, TrackingError> {
        if dest.join(COMPLETE_MARKER).is_file() {
            tracing::debug!(dest = %dest.display(), "Reusing cached artifact");
            return Ok(dest.to_path_buf());
        }
        if dest.exists() {
            tokio::fs::remove_dir_all(dest)
                .await
                .map_err(|e| TrackingError::io(dest, e))?;
        }
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| TrackingError::io(dest, e))?;

        let mut pending = vec![String::new()];
        let mut files = 0usize;
        let mut total_bytes = 0u64;

        while let Some(relative) = pending.pop() {
            for entry in self.list_artifacts(&join_path(root, &relative)).await? {
                // Listings return names relative to the listed directory
                let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
                let child = join_path(&relative, name);
                if entry.is_dir {
                    pending.push(child);
                } else {
                    total_bytes += self
                        .download_file(&join_path(root, &child), &dest.join(&child))
                        .await?;
                    files += 1;
                }
            }
        }

        // An empty listing means the root itself is a file
        if files == 0 {
            let name = root.rsplit('/').next().unwrap_or(root);
            total_bytes += self.download_file(root, &dest.join(name)).await?;
            files = 1;
        }

        let marker = dest.join(COMPLETE_MARKER);
        tokio::fs::write(&marker, b"")
            .await
            .map_err(|e| TrackingError::io(&marker, e))?;

        tracing::info!(root, files, total_bytes, dest = %dest.display(), "Downloaded artifacts");
        Ok(dest.to_path_buf())
    }
}

fn join_path(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{}/{}", a.trim_end_matches('/'), b),
    }
}

async fn check_status(url: &str, resp: Response) -> Result<Response, TrackingError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    Err(TrackingError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        code: body.error_code,
        message: body.message.unwrap_or(text),
    })
}

async fn handle_response<T: DeserializeOwned>(url: String, resp: Response) -> Result<T, TrackingError> {
    let resp = check_status(&url, resp).await?;
    resp.json()
        .await
        .map_err(|e| TrackingError::Decode {
            url,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "model"), "model");
        assert_eq!(join_path("1/abc/artifacts/model", ""), "1/abc/artifacts/model");
        assert_eq!(join_path("model", "data/model.onnx"), "model/data/model.onnx");
    }

    #[test]
    fn test_urls() {
        let config = TrackingConfig {
            uri: "http://mlflow:5000/".to_string(),
            ..Default::default()
        };
        let client = TrackingClient::new(&config).unwrap();
        assert_eq!(client.base_uri(), "http://mlflow:5000");
        assert_eq!(
            client.url("runs/search"),
            "http://mlflow:5000/api/2.0/mlflow/runs/search"
        );
        assert_eq!(
            client.artifacts_url("1/abc/artifacts/model/MLmodel"),
            "http://mlflow:5000/api/2.0/mlflow-artifacts/artifacts/1/abc/artifacts/model/MLmodel"
        );
    }

    #[tokio::test]
    async fn test_fetch_local_artifact_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let client = TrackingClient::new(&TrackingConfig::default()).unwrap();

        let uri = format!("file://{}", dir.path().display());
        let path = client.fetch_artifact(&uri, Path::new("/unused")).await.unwrap();
        assert_eq!(path, dir.path());

        let missing = client
            .fetch_artifact("file:///definitely/missing", Path::new("/unused"))
            .await
            .unwrap_err();
        assert!(matches!(missing, TrackingError::Io { .. }));
    }

    #[tokio::test]
    async fn test_fetch_unsupported_scheme() {
        let client = TrackingClient::new(&TrackingConfig::default()).unwrap();
        let err = client
            .fetch_artifact("s3://bucket/model", Path::new("/unused"))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackingError::UnsupportedUri(_)));
    }
}
