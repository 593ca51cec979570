use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator preferences remembered between runs, stored under the user
/// config directory. Losing or corrupting this file is never fatal; the
/// installer just falls back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    pub locale: String,
    pub last_install_dir: Option<PathBuf>,
    pub last_mode: Option<String>,
    pub last_used: Option<DateTime<Utc>>,
}

impl Default for Prefs {
    fn default() -> Self {
        Self { locale: "en".to_string(), last_install_dir: None, last_mode: None, last_used: None }
    }
}

impl Prefs {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lobe-setup").join("config.json"))
    }

    pub fn load() -> Self {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read preferences");
                return Self::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed preferences");
            Self::default()
        })
    }

    pub fn save(&self) {
        let Some(path) = Self::path() else { return };
        if let Err(e) = self.save_to(&path) {
            tracing::warn!(path = %path.display(), error = %e, "cannot save preferences");
        }
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create config directory")?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).context("write preferences")?;
        Ok(())
    }

    /// Record the inputs of a completed run as the next run's defaults.
    pub fn remember(&mut self, install_dir: &Path, mode: &str) {
        self.last_install_dir = Some(install_dir.to_path_buf());
        self.last_mode = Some(mode.to_string());
        self.last_used = Some(Utc::now());
    }
}
