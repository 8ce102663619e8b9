use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the assembly backend.
/// Every module returns `Result<T, AssemblerError>`.
#[derive(Debug, Error)]
pub enum AssemblerError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Registry ────────────────────────────────────────
    #[error("Mod not found in registry: {0}")]
    RegistryLookup(String),

    // ── Remote sources ──────────────────────────────────
    #[error("No release asset in {repo} matching {wanted}")]
    NoMatchingAsset { repo: String, wanted: String },

    #[error("No releases published for {0}")]
    NoReleases(String),

    #[error("Package registry returned no usable version for {0}")]
    EmptyPackageVersions(String),

    /// Wraps whatever went wrong while producing the artifact for `key`.
    #[error("Fetch failed for {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: Box<AssemblerError>,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive error at {path:?}: {reason}")]
    Archive { path: PathBuf, reason: String },

    // ── Runtime ─────────────────────────────────────────
    #[error("Task join error: {0}")]
    TaskJoin(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type AssemblerResult<T> = Result<T, AssemblerError>;

impl AssemblerError {
    /// Wrap `source` as a fetch failure for `key`. Already-wrapped errors
    /// are returned unchanged.
    pub fn fetch(key: &str, source: AssemblerError) -> Self {
        match source {
            AssemblerError::Fetch { .. } => source,
            other => AssemblerError::Fetch {
                key: key.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Whether this error ends an in-flight assembly.
    ///
    /// Registry misses and per-mod fetch failures are absorbed by the
    /// assembler; everything else is structural.
    pub fn is_fatal_for_assembly(&self) -> bool {
        !matches!(
            self,
            AssemblerError::RegistryLookup(_) | AssemblerError::Fetch { .. }
        )
    }
}

impl From<std::io::Error> for AssemblerError {
    fn from(source: std::io::Error) -> Self {
        AssemblerError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for AssemblerError {
    fn from(e: tokio::task::JoinError) -> Self {
        AssemblerError::TaskJoin(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_wrapping_is_not_nested() {
        let inner = AssemblerError::NoReleases("owner/repo".into());
        let once = AssemblerError::fetch("examplemod", inner);
        let twice = AssemblerError::fetch("other", once);

        match twice {
            AssemblerError::Fetch { key, source } => {
                assert_eq!(key, "examplemod");
                assert!(matches!(*source, AssemblerError::NoReleases(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fetch_failures_are_not_fatal() {
        let err = AssemblerError::fetch("m", AssemblerError::Other("boom".into()));
        assert!(!err.is_fatal_for_assembly());
        assert!(!AssemblerError::RegistryLookup("m".into()).is_fatal_for_assembly());
        assert!(AssemblerError::Archive {
            path: PathBuf::from("x.zip"),
            reason: "corrupt".into(),
        }
        .is_fatal_for_assembly());
    }
}
