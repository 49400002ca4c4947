//! In-process stand-in for an MLflow tracking server

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const FAKE_ONNX_BYTES: &[u8] = b"fake-onnx-bytes";

const MLMODEL: &str = "artifact_path: model\nflavors:\n  onnx:\n    data: model.onnx\n    onnx_version: 1.14.0\n  python_function:\n    loader_module: mlflow.onnx\n";

/// Scripted tracking server state
#[derive(Default)]
pub struct FakeMlflow {
    /// Version served for the registry stage, if any
    pub registry_version: Option<String>,
    /// Whether the experiment exists
    pub experiment_exists: bool,
    /// Run ids returned by search, best first
    pub runs: Vec<String>,
    /// Artifact store: full path -> contents
    pub files: HashMap<String, Vec<u8>>,
    /// Every request seen, as "METHOD path"
    pub calls: Mutex<Vec<String>>,
    /// `order_by` of the last run search
    pub last_order_by: Mutex<Option<Vec<String>>>,
}

impl FakeMlflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve an MLflow ONNX model directory at `root`
    pub fn with_model_at(mut self, root: &str) -> Self {
        self.files
            .insert(format!("{}/MLmodel", root), MLMODEL.as_bytes().to_vec());
        self.files
            .insert(format!("{}/model.onnx", root), FAKE_ONNX_BYTES.to_vec());
        self.files.insert(
            format!("{}/metadata/requirements.txt", root),
            b"onnx==1.14.0\n".to_vec(),
        );
        self
    }

    pub fn with_registry_version(mut self, version: &str) -> Self {
        self.registry_version = Some(version.to_string());
        self
    }

    pub fn with_runs(mut self, runs: &[&str]) -> Self {
        self.experiment_exists = true;
        self.runs = runs.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_experiment(mut self) -> Self {
        self.experiment_exists = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Bind on an ephemeral port and serve in the background
    pub async fn spawn(self) -> (String, Arc<FakeMlflow>) {
        let state = Arc::new(self);
        let app = Router::new()
            .route(
                "/api/2.0/mlflow/registered-models/get-latest-versions",
                get(latest_versions),
            )
            .route(
                "/api/2.0/mlflow/model-versions/get-download-uri",
                get(download_uri),
            )
            .route(
                "/api/2.0/mlflow/experiments/get-by-name",
                get(experiment_by_name),
            )
            .route("/api/2.0/mlflow/runs/search", post(search_runs))
            .route("/api/2.0/mlflow-artifacts/artifacts", get(list_artifacts))
            .route(
                "/api/2.0/mlflow-artifacts/artifacts/*path",
                get(download_artifact),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), state)
    }
}

fn not_found(message: String) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error_code": "RESOURCE_DOES_NOT_EXIST", "message": message })),
    )
        .into_response()
}

async fn latest_versions(
    State(fake): State<Arc<FakeMlflow>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    fake.record("GET get-latest-versions".to_string());
    let name = params.get("name").cloned().unwrap_or_default();
    let stage = params.get("stages").cloned().unwrap_or_default();

    match &fake.registry_version {
        Some(version) => Json(json!({
            "model_versions": [{
                "name": name,
                "version": version,
                "current_stage": stage,
                "source": "mlflow-artifacts:/1/abc/artifacts/model",
                "run_id": "abc",
                "status": "READY"
            }]
        }))
        .into_response(),
        None => not_found(format!("Registered Model with name={} not found", name)),
    }
}

async fn download_uri(
    State(fake): State<Arc<FakeMlflow>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    fake.record(format!(
        "GET get-download-uri version={}",
        params.get("version").cloned().unwrap_or_default()
    ));
    Json(json!({ "artifact_uri": "mlflow-artifacts:/1/abc/artifacts/model" })).into_response()
}

async fn experiment_by_name(
    State(fake): State<Arc<FakeMlflow>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    fake.record("GET get-by-name".to_string());
    let name = params.get("experiment_name").cloned().unwrap_or_default();
    if fake.experiment_exists {
        Json(json!({
            "experiment": {
                "experiment_id": "1",
                "name": name,
                "artifact_location": "mlflow-artifacts:/1",
                "lifecycle_stage": "active"
            }
        }))
        .into_response()
    } else {
        not_found(format!("Experiment '{}' does not exist.", name))
    }
}

async fn search_runs(State(fake): State<Arc<FakeMlflow>>, Json(body): Json<Value>) -> Response {
    fake.record("POST runs/search".to_string());
    let order_by = body["order_by"].as_array().map(|items| {
        items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect::<Vec<_>>()
    });
    *fake.last_order_by.lock().unwrap() = order_by;

    let max = body["max_results"].as_u64().unwrap_or(1000) as usize;
    let runs: Vec<Value> = fake
        .runs
        .iter()
        .take(max)
        .enumerate()
        .map(|(i, id)| {
            json!({
                "info": {
                    "run_id": id,
                    "experiment_id": "1",
                    "status": "FINISHED",
                    "artifact_uri": format!("mlflow-artifacts:/1/{}/artifacts", id)
                },
                "data": {
                    "metrics": [{ "key": "test_accuracy", "value": 0.99 - i as f64 * 0.01, "timestamp": 0, "step": 0 }]
                }
            })
        })
        .collect();

    Json(json!({ "runs": runs })).into_response()
}

async fn list_artifacts(
    State(fake): State<Arc<FakeMlflow>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let path = params.get("path").cloned().unwrap_or_default();
    fake.record(format!("LIST {}", path));

    let prefix = format!("{}/", path.trim_end_matches('/'));
    let mut entries: BTreeMap<String, bool> = BTreeMap::new();
    for key in fake.files.keys() {
        if let Some(rest) = key.strip_prefix(&prefix) {
            match rest.split_once('/') {
                Some((dir, _)) => entries.insert(dir.to_string(), true),
                None => entries.insert(rest.to_string(), false),
            };
        }
    }

    let files: Vec<Value> = entries
        .into_iter()
        .map(|(name, is_dir)| json!({ "path": name, "is_dir": is_dir }))
        .collect();
    if files.is_empty() {
        Json(json!({})).into_response()
    } else {
        Json(json!({ "files": files })).into_response()
    }
}

async fn download_artifact(
    State(fake): State<Arc<FakeMlflow>>,
    Path(path): Path<String>,
) -> Response {
    fake.record(format!("DOWNLOAD {}", path));
    match fake.files.get(path.trim_start_matches('/')) {
        Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
        None => not_found(format!("{} not found", path)),
    }
}
