//! Model loading utilities
//!
//! Turns an artifact on disk into a `Classifier`. The resolver only depends on
//! the `ArtifactLoader` trait so tests can substitute a stub backend.

mod detect;

pub use detect::{detect_model_source, MlModel, ModelSource, MLMODEL_FILE};

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::model::{Classifier, OnnxClassifier};

/// Loads a classifier from a local artifact path
pub trait ArtifactLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>>;
}

/// Loader for ONNX graphs, the only artifact format served
#[derive(Debug, Default, Clone, Copy)]
pub struct OnnxLoader;

impl ArtifactLoader for OnnxLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>> {
        let classifier = load_model(path)?;
        Ok(Arc::new(classifier))
    }
}

/// Load a model from a file or artifact directory
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<OnnxClassifier> {
    let source = detect_model_source(path.as_ref())?;
    tracing::info!(
        weights = %source.weights_path.display(),
        run_id = source.run_id.as_deref().unwrap_or("-"),
        "Loading ONNX model"
    );
    let classifier = OnnxClassifier::load(&source.weights_path)?;
    tracing::debug!(layout = ?classifier.layout(), "ONNX input layout");
    Ok(classifier)
}
