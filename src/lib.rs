//! digitserve - serving layer for MNIST digit classifiers
//!
//! Locates a trained model (a local path, a model registry stage, or the
//! best run of an experiment on an MLflow tracking server), normalizes
//! uploaded images into the 28x28 grayscale tensor the model expects, and
//! serves predictions over HTTP.
//!
//! # Architecture
//!
//! - **preprocess**: base64/data-URL payload to `(1, 28, 28, 1)` tensor
//! - **model**: the opaque `Classifier` capability and its ONNX backend
//! - **loader**: artifact detection (bare `.onnx` or MLflow model directory)
//! - **tracking**: MLflow REST client and artifact download
//! - **resolver**: ordered chain of resolution strategies
//! - **engine**: model slot, lazy single-flight reload, prediction pipeline
//! - **server**: axum routes for health, predict, info and metrics
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! MLFLOW_TRACKING_URI=http://mlflow:5000 digitserve serve --port 8000
//!
//! # Check which model would be served
//! digitserve resolve
//!
//! # Classify a file
//! digitserve predict --image seven.png
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod loader;
pub mod model;
pub mod preprocess;
pub mod resolver;
pub mod server;
pub mod telemetry;
pub mod tracking;

// Re-export key types
pub use config::{AppConfig, PreprocessConfig, ServerConfig, TrackingConfig};
pub use engine::{ModelManager, ModelSlot, PredictError, Predictor};
pub use loader::{load_model, ArtifactLoader, OnnxLoader};
pub use model::{Classifier, LoadedModel, ModelOrigin, Prediction};
pub use resolver::{ModelResolver, ResolveError};
