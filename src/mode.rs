use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::InstallError;

/// Where the deployment's database and object storage live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Everything runs inside the compose network.
    Local,
    /// Database and storage point at operator-supplied external endpoints.
    Remote,
    /// Local services, but object storage on an external S3 bucket.
    S3,
}

impl DeployMode {
    pub const ALL: [DeployMode; 3] = [DeployMode::Local, DeployMode::Remote, DeployMode::S3];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeployMode::Local => "local",
            DeployMode::Remote => "remote",
            DeployMode::S3 => "s3",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DeployMode::Local => "Local (all services in containers)",
            DeployMode::Remote => "Remote (external database and storage)",
            DeployMode::S3 => "S3 (local services, S3-backed storage)",
        }
    }
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeployMode {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(DeployMode::Local),
            "remote" => Ok(DeployMode::Remote),
            "s3" => Ok(DeployMode::S3),
            other => Err(InstallError::Configuration(format!(
                "unknown deployment mode {other:?} (expected local, remote or s3)"
            ))),
        }
    }
}

/// Keys that always track the current run's `--host`, never a prior install.
/// A host change between runs is legitimate and must not be "preserved" away.
pub const HOST_DERIVED_KEYS: &[&str] = &["APP_URL", "AUTH_URL", "DEPLOYMENT_MODE"];

/// The variable set one mode contributes to the environment file.
#[derive(Debug, Clone, Default)]
pub struct ModeVars {
    pub vars: BTreeMap<String, String>,
    /// Keys emitted as empty placeholders the operator must fill by hand.
    pub needs_manual: Vec<String>,
}

impl ModeVars {
    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }

    fn manual(&mut self, key: &str) {
        self.vars.insert(key.to_string(), String::new());
        self.needs_manual.push(key.to_string());
    }
}

/// Derive the full mode-specific variable set. Pure: same inputs, same output.
pub fn resolve(mode: DeployMode, host: &str) -> Result<ModeVars, InstallError> {
    let host = host.trim();
    if host.is_empty() && mode == DeployMode::Remote {
        return Err(InstallError::Configuration(
            "remote mode requires a public host (--host or the host prompt)".into(),
        ));
    }
    let public_url = if host.is_empty() { "http://localhost:3210" } else { host };

    let mut out = ModeVars::default();
    out.set("DEPLOYMENT_MODE", mode.as_str());
    out.set("APP_URL", public_url);
    out.set("AUTH_URL", format!("{}/api/auth", public_url.trim_end_matches('/')));

    match mode {
        DeployMode::Local => {
            out.set("DATABASE_HOST", "postgresql");
            out.set("DATABASE_PORT", "5432");
            out.set("STORAGE_ENDPOINT", "http://minio:9000");
        }
        DeployMode::Remote => {
            let authority = strip_scheme(public_url);
            out.set("DATABASE_HOST", authority);
            out.set("DATABASE_PORT", "5432");
            out.set("STORAGE_ENDPOINT", format!("{}/storage", public_url.trim_end_matches('/')));
        }
        DeployMode::S3 => {
            out.set("DATABASE_HOST", "postgresql");
            out.set("DATABASE_PORT", "5432");
            out.manual("S3_BUCKET");
            out.manual("S3_REGION");
            out.manual("S3_ENDPOINT");
            out.manual("S3_ACCESS_KEY_ID");
            out.manual("S3_SECRET_ACCESS_KEY");
        }
    }
    Ok(out)
}

fn strip_scheme(url: &str) -> &str {
    let rest = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://")).unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_deterministic() {
        let a = resolve(DeployMode::Local, "http://localhost:3210").unwrap();
        let b = resolve(DeployMode::Local, "http://localhost:3210").unwrap();
        assert_eq!(a.vars, b.vars);
        assert_eq!(a.needs_manual, b.needs_manual);
    }

    #[test]
    fn local_mode_points_at_compose_services() {
        let vars = resolve(DeployMode::Local, "http://localhost:3210").unwrap().vars;
        assert_eq!(vars["DEPLOYMENT_MODE"], "local");
        assert_eq!(vars["APP_URL"], "http://localhost:3210");
        assert_eq!(vars["AUTH_URL"], "http://localhost:3210/api/auth");
        assert_eq!(vars["DATABASE_HOST"], "postgresql");
        assert_eq!(vars["STORAGE_ENDPOINT"], "http://minio:9000");
    }

    #[test]
    fn remote_mode_requires_host() {
        let err = resolve(DeployMode::Remote, "  ").unwrap_err();
        assert!(matches!(err, InstallError::Configuration(_)));
    }

    #[test]
    fn remote_mode_derives_endpoints_from_host() {
        let vars = resolve(DeployMode::Remote, "https://chat.example.com").unwrap().vars;
        assert_eq!(vars["DATABASE_HOST"], "chat.example.com");
        assert_eq!(vars["STORAGE_ENDPOINT"], "https://chat.example.com/storage");
    }

    #[test]
    fn s3_mode_emits_manual_placeholders() {
        let resolved = resolve(DeployMode::S3, "http://localhost:3210").unwrap();
        for key in ["S3_BUCKET", "S3_REGION", "S3_ENDPOINT", "S3_ACCESS_KEY_ID", "S3_SECRET_ACCESS_KEY"] {
            assert_eq!(resolved.vars[key], "");
            assert!(resolved.needs_manual.contains(&key.to_string()));
        }
        // Base set still present.
        assert_eq!(resolved.vars["DATABASE_HOST"], "postgresql");
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("S3".parse::<DeployMode>().unwrap(), DeployMode::S3);
        assert_eq!("Remote".parse::<DeployMode>().unwrap(), DeployMode::Remote);
        assert!("kubernetes".parse::<DeployMode>().is_err());
    }
}
