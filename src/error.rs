use std::path::PathBuf;

use thiserror::Error;

/// Failures from the artifact download layer.
///
/// `Network` and `Server` are transient and eligible for retry; `NotFound`
/// and `Integrity` are definitive for the attempted URL.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error fetching {artifact}: {source}")]
    Network {
        artifact: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("artifact {artifact} not found at {url}")]
    NotFound { artifact: String, url: String },

    #[error("server returned {status} for {artifact}")]
    Server { artifact: String, status: u16 },

    #[error("checksum mismatch for {artifact} (expected {expected})")]
    Integrity { artifact: String, expected: String },
}

impl FetchError {
    /// Whether another attempt against the same URL could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network { .. } | FetchError::Server { .. })
    }
}

/// Top-level installer failure classes. Each class maps to a distinct
/// process exit code so scripts can tell a flaky mirror from bad input.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("configuration key {key} is declared by the template but resolved to no value")]
    IncompleteConfiguration { key: String },

    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("secure random source unavailable: {0}")]
    Entropy(getrandom::Error),
}

impl InstallError {
    pub fn exit_code(&self) -> i32 {
        match self {
            InstallError::Fetch(_) => 2,
            InstallError::Configuration(_) => 3,
            InstallError::IncompleteConfiguration { .. } => 4,
            InstallError::Filesystem { .. } => 5,
            InstallError::Entropy(_) => 6,
        }
    }

    /// Shorthand for wrapping an io error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Filesystem { path: path.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_and_network_errors_are_retryable() {
        let err = FetchError::Server { artifact: "docker-compose.yml".into(), status: 503 };
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_is_not_retryable() {
        let err = FetchError::NotFound {
            artifact: "init_data.json".into(),
            url: "http://example.invalid/init_data.json".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn exit_codes_are_distinct_per_class() {
        let fetch = InstallError::Fetch(FetchError::Server {
            artifact: "docker-compose.yml".into(),
            status: 500,
        });
        let config = InstallError::Configuration("remote mode requires a host".into());
        let incomplete = InstallError::IncompleteConfiguration { key: "AUTH_SECRET".into() };
        let fs = InstallError::fs("/tmp/x", std::io::Error::from(std::io::ErrorKind::Other));

        let codes = [fetch.exit_code(), config.exit_code(), incomplete.exit_code(), fs.exit_code()];
        let mut dedup = codes.to_vec();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), codes.len());
        assert!(codes.iter().all(|c| *c != 0));
    }
}
