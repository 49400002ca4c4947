//! Tracking server client
//!
//! A thin async client over the MLflow REST API: registry lookups, run
//! search, artifact download and the registration calls used by `promote`.

mod artifacts;
mod client;
mod types;

pub use artifacts::{cache_key, join_uri, ArtifactUri};
pub use client::TrackingClient;
pub use types::{ErrorBody, Experiment, FileInfo, Metric, ModelVersion, Run, RunData, RunInfo, Tag};

use thiserror::Error;

/// MLflow error code for missing entities
pub const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";

/// Tracking server errors
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {message}")]
    Status {
        url: String,
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("unsupported artifact URI: {0}")]
    UnsupportedUri(String),

    #[error("artifact IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TrackingError {
    /// True if the server reported the entity as missing
    pub fn is_not_found(&self) -> bool {
        match self {
            TrackingError::Status { status, code, .. } => {
                *status == 404 || code.as_deref() == Some(RESOURCE_DOES_NOT_EXIST)
            }
            _ => false,
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        TrackingError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
