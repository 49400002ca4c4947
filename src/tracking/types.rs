//! MLflow REST API payloads

use serde::{Deserialize, Serialize};

/// A registered model version
#[derive(Debug, Clone, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    #[serde(default)]
    pub artifact_location: Option<String>,
    #[serde(default)]
    pub lifecycle_stage: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    #[serde(default)]
    pub experiment_id: Option<String>,
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub artifact_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metric {
    pub key: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunData {
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A tracked training run
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub info: RunInfo,
    #[serde(default)]
    pub data: RunData,
}

impl Run {
    pub fn id(&self) -> &str {
        &self.info.run_id
    }

    /// Latest logged value of a metric
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.data
            .metrics
            .iter()
            .find(|m| m.key == key)
            .map(|m| m.value)
    }

    /// Human name of the run, from `info.run_name` or the `mlflow.runName` tag
    pub fn name(&self) -> Option<&str> {
        self.info.run_name.as_deref().or_else(|| {
            self.data
                .tags
                .iter()
                .find(|t| t.key == "mlflow.runName")
                .map(|t| t.value.as_str())
        })
    }
}

/// Entry of an artifact listing
#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Error body returned by MLflow on failure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LatestVersionsResponse {
    #[serde(default)]
    pub model_versions: Vec<ModelVersion>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DownloadUriResponse {
    pub artifact_uri: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExperimentResponse {
    pub experiment: Experiment,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunResponse {
    pub run: Run,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRunsResponse {
    #[serde(default)]
    pub runs: Vec<Run>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelVersionResponse {
    pub model_version: ModelVersion,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListArtifactsResponse {
    #[serde(default)]
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchRunsRequest<'a> {
    pub experiment_ids: Vec<&'a str>,
    pub order_by: Vec<String>,
    pub max_results: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateModelVersionRequest<'a> {
    pub name: &'a str,
    pub source: &'a str,
    pub run_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TransitionStageRequest<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub stage: &'a str,
    pub archive_existing_versions: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_parsing() {
        let body = r#"{
            "runs": [{
                "info": {
                    "run_id": "abc",
                    "experiment_id": "1",
                    "status": "FINISHED",
                    "artifact_uri": "mlflow-artifacts:/1/abc/artifacts"
                },
                "data": {
                    "metrics": [{"key": "test_accuracy", "value": 0.991, "timestamp": 1, "step": 0}],
                    "tags": [{"key": "mlflow.runName", "value": "cnn-deep"}]
                }
            }]
        }"#;
        let parsed: SearchRunsResponse = serde_json::from_str(body).unwrap();
        let run = &parsed.runs[0];
        assert_eq!(run.id(), "abc");
        assert_eq!(run.metric("test_accuracy"), Some(0.991));
        assert_eq!(run.metric("test_loss"), None);
        assert_eq!(run.name(), Some("cnn-deep"));
    }

    #[test]
    fn test_empty_responses() {
        let parsed: LatestVersionsResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.model_versions.is_empty());
        let parsed: SearchRunsResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.runs.is_empty());
    }
}
