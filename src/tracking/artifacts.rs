//! Artifact URI handling

use std::fmt;
use std::path::PathBuf;

use super::TrackingError;

/// Where an artifact lives, as far as this client can fetch it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactUri {
    /// Local filesystem path, read in place
    Local(PathBuf),
    /// Path relative to the tracking server's proxied artifact root
    Proxied(String),
    /// Artifact under a run, resolved through the run's `artifact_uri`
    Run { run_id: String, path: String },
}

impl ArtifactUri {
    pub fn parse(uri: &str) -> Result<Self, TrackingError> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(TrackingError::UnsupportedUri(uri.to_string()));
        }

        if let Some(rest) = uri.strip_prefix("file:") {
            let rest = match rest.strip_prefix("//") {
                // file://localhost/path and file:///path
                Some(r) => &r[r.find('/').unwrap_or(r.len())..],
                None => rest,
            };
            if rest.is_empty() {
                return Err(TrackingError::UnsupportedUri(uri.to_string()));
            }
            return Ok(ArtifactUri::Local(PathBuf::from(rest)));
        }

        if let Some(rest) = uri.strip_prefix("mlflow-artifacts:") {
            let rest = match rest.strip_prefix("//") {
                // mlflow-artifacts://host:port/path carries an authority we ignore
                Some(r) => &r[r.find('/').unwrap_or(r.len())..],
                None => rest,
            };
            return Ok(ArtifactUri::Proxied(rest.trim_matches('/').to_string()));
        }

        if let Some(rest) = uri.strip_prefix("runs:") {
            let rest = rest.trim_start_matches('/');
            let (run_id, path) = rest.split_once('/').unwrap_or((rest, ""));
            if run_id.is_empty() {
                return Err(TrackingError::UnsupportedUri(uri.to_string()));
            }
            return Ok(ArtifactUri::Run {
                run_id: run_id.to_string(),
                path: path.trim_matches('/').to_string(),
            });
        }

        if has_scheme(uri) {
            return Err(TrackingError::UnsupportedUri(uri.to_string()));
        }

        Ok(ArtifactUri::Local(PathBuf::from(uri)))
    }
}

impl fmt::Display for ArtifactUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactUri::Local(path) => write!(f, "{}", path.display()),
            ArtifactUri::Proxied(path) => write!(f, "mlflow-artifacts:/{}", path),
            ArtifactUri::Run { run_id, path } => write!(f, "runs:/{}/{}", run_id, path),
        }
    }
}

/// `scheme:` prefix longer than one character (so `C:\...` stays a path)
fn has_scheme(uri: &str) -> bool {
    match uri.find(':') {
        Some(idx) if idx > 1 => uri[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

/// Join an artifact root URI and a relative path
pub fn join_uri(base: &str, path: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }
}

/// Filesystem-safe cache key for an artifact
pub fn cache_key(parts: &[&str]) -> PathBuf {
    parts
        .iter()
        .map(|p| {
            p.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect::<String>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_uris() {
        assert_eq!(
            ArtifactUri::parse("file:///mlruns/1/abc/artifacts/model").unwrap(),
            ArtifactUri::Local(PathBuf::from("/mlruns/1/abc/artifacts/model"))
        );
        assert_eq!(
            ArtifactUri::parse("file:/tmp/model").unwrap(),
            ArtifactUri::Local(PathBuf::from("/tmp/model"))
        );
        assert_eq!(
            ArtifactUri::parse("file://localhost/tmp/model").unwrap(),
            ArtifactUri::Local(PathBuf::from("/tmp/model"))
        );
        assert_eq!(
            ArtifactUri::parse("./mlruns/1/model").unwrap(),
            ArtifactUri::Local(PathBuf::from("./mlruns/1/model"))
        );
    }

    #[test]
    fn test_parse_proxied() {
        assert_eq!(
            ArtifactUri::parse("mlflow-artifacts:/1/abc/artifacts/model").unwrap(),
            ArtifactUri::Proxied("1/abc/artifacts/model".to_string())
        );
        assert_eq!(
            ArtifactUri::parse("mlflow-artifacts://tracking:5000/1/abc/artifacts").unwrap(),
            ArtifactUri::Proxied("1/abc/artifacts".to_string())
        );
    }

    #[test]
    fn test_parse_runs() {
        assert_eq!(
            ArtifactUri::parse("runs:/abc123/model").unwrap(),
            ArtifactUri::Run {
                run_id: "abc123".to_string(),
                path: "model".to_string()
            }
        );
        assert!(ArtifactUri::parse("runs:/").is_err());
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = ArtifactUri::parse("s3://bucket/model").unwrap_err();
        assert!(matches!(err, TrackingError::UnsupportedUri(_)));
        assert!(ArtifactUri::parse("gs://bucket/model").is_err());
    }

    #[test]
    fn test_join_and_cache_key() {
        assert_eq!(join_uri("mlflow-artifacts:/1/abc/artifacts/", "/model"), "mlflow-artifacts:/1/abc/artifacts/model");
        assert_eq!(join_uri("file:///x", ""), "file:///x");
        assert_eq!(
            cache_key(&["registry", "Mnist Best", "3"]),
            PathBuf::from("registry/Mnist_Best/3")
        );
    }
}
