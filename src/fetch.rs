use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::error::FetchError;

/// One file to retrieve from the source mirror.
#[derive(Debug, Clone)]
pub struct ArtifactSpec {
    /// Filename the artifact is saved under in the install directory.
    pub name: String,
    /// Path joined onto the source base URL.
    pub relative_path: String,
    pub required: bool,
    /// Optional sha256 (hex) pin; mismatch is an integrity failure.
    pub sha256: Option<String>,
}

impl ArtifactSpec {
    fn new(name: &str, relative_path: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            relative_path: relative_path.to_string(),
            required,
            sha256: None,
        }
    }
}

/// The fixed artifact set for one run. The env template filename depends on
/// the operator's locale but is always saved as `.env.example`.
pub fn artifact_catalog(locale: &str) -> Vec<ArtifactSpec> {
    let env_template = if locale == "zh-CN" {
        "docker-compose/local/.env.zh-CN.example"
    } else {
        "docker-compose/local/.env.example"
    };

    vec![
        ArtifactSpec::new("docker-compose.yml", "docker-compose/local/docker-compose.yml", true),
        ArtifactSpec::new(".env.example", env_template, true),
        ArtifactSpec::new("init_data.json", "docker-compose/local/init_data.json", false),
        ArtifactSpec::new("README.md", "docker-compose/local/README.md", false),
    ]
}

/// Retry behavior for one artifact, injected so tests can zero the backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn for_spec(spec: &ArtifactSpec) -> Self {
        if spec.required {
            // Required artifacts get a few tries against a flaky mirror.
            Self { max_attempts: 3, backoff: Duration::from_secs(2) }
        } else {
            Self { max_attempts: 1, backoff: Duration::ZERO }
        }
    }
}

/// Downloads artifacts from the source base URL.
///
/// Returns bytes only; writing them to disk is the orchestrator's atomic
/// step, so a failed fetch never leaves a partial file behind.
pub struct SourceFetcher {
    client: reqwest::Client,
    base_url: String,
    backoff_override: Option<Duration>,
}

impl SourceFetcher {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("lobe-setup/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            backoff_override: None,
        })
    }

    #[cfg(test)]
    fn without_backoff(mut self) -> Self {
        self.backoff_override = Some(Duration::ZERO);
        self
    }

    pub fn artifact_url(&self, spec: &ArtifactSpec) -> String {
        format!("{}/{}", self.base_url, spec.relative_path)
    }

    /// Fetch one artifact, retrying transient failures per its policy.
    pub async fn fetch(&self, spec: &ArtifactSpec) -> Result<Vec<u8>, FetchError> {
        let mut policy = RetryPolicy::for_spec(spec);
        if let Some(backoff) = self.backoff_override {
            policy.backoff = backoff;
        }

        let mut attempt = 1;
        loop {
            match self.fetch_once(spec).await {
                Ok(bytes) => {
                    verify_checksum(spec, &bytes)?;
                    return Ok(bytes);
                }
                Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                    tracing::warn!(
                        artifact = %spec.name,
                        attempt,
                        error = %err,
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(policy.backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(&self, spec: &ArtifactSpec) -> Result<Vec<u8>, FetchError> {
        let url = self.artifact_url(spec);
        let network = |source| FetchError::Network { artifact: spec.name.clone(), source };

        let response = self.client.get(&url).send().await.map_err(network)?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound { artifact: spec.name.clone(), url });
        }
        if !status.is_success() {
            return Err(FetchError::Server { artifact: spec.name.clone(), status: status.as_u16() });
        }

        let bytes = response.bytes().await.map_err(network)?;
        Ok(bytes.to_vec())
    }
}

fn verify_checksum(spec: &ArtifactSpec, bytes: &[u8]) -> Result<(), FetchError> {
    let Some(expected) = &spec.sha256 else {
        return Ok(());
    };
    let actual = hex::encode(Sha256::digest(bytes));
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(FetchError::Integrity { artifact: spec.name.clone(), expected: expected.clone() })
    }
}
