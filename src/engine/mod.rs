//! Serving engine
//!
//! - `ModelSlot`: the atomically swappable model being served
//! - `ModelManager`: background and lazy resolution into the slot
//! - `Predictor`: the per-request prediction pipeline

mod manager;
mod predictor;
mod slot;

pub use manager::ModelManager;
pub use predictor::{PredictError, PredictOutcome, Predictor};
pub use slot::ModelSlot;
