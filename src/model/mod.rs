//! Model abstraction
//!
//! The serving code only knows one thing about a model: it maps a normalized
//! digit tensor to a probability vector over the ten classes.

mod onnx;
mod prediction;

pub use onnx::{InputLayout, OnnxClassifier};
pub use prediction::{Prediction, NUM_CLASSES};

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::preprocess::DigitTensor;

/// Something that maps a digit tensor to class probabilities
pub trait Classifier: Send + Sync {
    /// Return one probability per class, summing to ~1.0
    fn predict(&self, input: &DigitTensor) -> Result<Vec<f32>>;
}

/// Which resolution step produced a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelOrigin {
    Local,
    Registry,
    Run,
}

impl fmt::Display for ModelOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelOrigin::Local => "local",
            ModelOrigin::Registry => "registry",
            ModelOrigin::Run => "run",
        };
        f.write_str(s)
    }
}

/// A servable model together with where it came from
pub struct LoadedModel {
    classifier: Arc<dyn Classifier>,
    version: String,
    origin: ModelOrigin,
    loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    pub fn new(classifier: Arc<dyn Classifier>, version: impl Into<String>, origin: ModelOrigin) -> Self {
        Self {
            classifier,
            version: version.into(),
            origin,
            loaded_at: Utc::now(),
        }
    }

    /// Version tag: `local:<name>`, a registry version number, or `run:<id>`
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn origin(&self) -> ModelOrigin {
        self.origin
    }

    /// When the model was swapped in
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Run inference and reduce the output to a prediction
    pub fn predict(&self, input: &DigitTensor) -> Result<Prediction> {
        let probabilities = self.classifier.predict(input)?;
        Prediction::from_probabilities(probabilities)
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("version", &self.version)
            .field("origin", &self.origin)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::PIXEL_COUNT;

    struct Fixed(Vec<f32>);

    impl Classifier for Fixed {
        fn predict(&self, _input: &DigitTensor) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_loaded_model_predict() {
        let mut probs = vec![0.01; NUM_CLASSES];
        probs[7] = 0.91;
        let model = LoadedModel::new(Arc::new(Fixed(probs)), "3", ModelOrigin::Registry);

        let input = DigitTensor::from_values(&[0.0; PIXEL_COUNT]).unwrap();
        let prediction = model.predict(&input).unwrap();
        assert_eq!(prediction.prediction, 7);
        assert_eq!(model.version(), "3");
        assert_eq!(model.origin().to_string(), "registry");
    }

    #[test]
    fn test_loaded_model_rejects_bad_output() {
        let model = LoadedModel::new(Arc::new(Fixed(vec![1.0; 3])), "x", ModelOrigin::Local);
        let input = DigitTensor::from_values(&[0.0; PIXEL_COUNT]).unwrap();
        assert!(model.predict(&input).is_err());
    }
}
