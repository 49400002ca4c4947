//! Model artifact detection
//!
//! An artifact may be a bare `.onnx` file, a directory holding one, or an
//! MLflow model directory whose `MLmodel` descriptor names the ONNX file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Name of the MLflow model descriptor file
pub const MLMODEL_FILE: &str = "MLmodel";

/// Detected model source
#[derive(Debug, Clone)]
pub struct ModelSource {
    /// Path to the ONNX graph
    pub weights_path: PathBuf,
    /// Path to the MLmodel descriptor (if the artifact is an MLflow model)
    pub descriptor_path: Option<PathBuf>,
    /// Run that logged the model, as recorded in the descriptor
    pub run_id: Option<String>,
}

/// The parts of an `MLmodel` file we care about
#[derive(Debug, Deserialize)]
pub struct MlModel {
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub flavors: BTreeMap<String, serde_yaml::Value>,
}

impl MlModel {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Relative path of the ONNX graph declared by the `onnx` flavor
    pub fn onnx_data(&self) -> Option<&str> {
        self.flavors.get("onnx")?.get("data")?.as_str()
    }

    pub fn flavor_names(&self) -> Vec<&str> {
        self.flavors.keys().map(String::as_str).collect()
    }
}

/// Detect the ONNX graph behind a path
///
/// The path can be:
/// - A direct path to a `.onnx` file
/// - An MLflow model directory (`MLmodel` + data)
/// - A directory containing a single `.onnx` file, possibly under `data/`
pub fn detect_model_source<P: AsRef<Path>>(path: P) -> Result<ModelSource> {
    let path = path.as_ref();

    if path.is_file() {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "onnx" => Ok(ModelSource {
                weights_path: path.to_path_buf(),
                descriptor_path: None,
                run_id: None,
            }),
            _ => Err(anyhow!("Unsupported model file format: .{}", ext)),
        }
    } else if path.is_dir() {
        detect_model_in_directory(path)
    } else {
        Err(anyhow!("Model path does not exist: {}", path.display()))
    }
}

fn detect_model_in_directory(dir: &Path) -> Result<ModelSource> {
    let descriptor = dir.join(MLMODEL_FILE);
    if descriptor.is_file() {
        let mlmodel = MlModel::from_path(&descriptor)?;
        let data = mlmodel.onnx_data().ok_or_else(|| {
            anyhow!(
                "MLflow model at {} has no onnx flavor (found: {})",
                dir.display(),
                mlmodel.flavor_names().join(", ")
            )
        })?;

        let weights_path = dir.join(data);
        if !weights_path.is_file() {
            return Err(anyhow!(
                "MLmodel points to {}, which does not exist",
                weights_path.display()
            ));
        }
        return Ok(ModelSource {
            weights_path,
            descriptor_path: Some(descriptor),
            run_id: mlmodel.run_id,
        });
    }

    for pattern in ["*.onnx", "data/*.onnx"] {
        if let Some(found) = find_first(dir, pattern) {
            return Ok(ModelSource {
                weights_path: found,
                descriptor_path: None,
                run_id: None,
            });
        }
    }

    Err(anyhow!(
        "No ONNX model found in directory: {}",
        dir.display()
    ))
}

/// First match of a glob pattern under `dir`, in sorted order
fn find_first(dir: &Path, pattern: &str) -> Option<PathBuf> {
    let full_pattern = dir.join(pattern);
    glob::glob(full_pattern.to_str()?)
        .ok()?
        .filter_map(|r| r.ok())
        .find(|p| p.is_file())
}
