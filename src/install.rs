use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};

use crate::assemble::{assemble, parse_env, render_env, ResolvedConfig};
use crate::error::{FetchError, InstallError};
use crate::fetch::{artifact_catalog, SourceFetcher};
use crate::mode::{self, DeployMode};
use crate::secrets::{self, SECRET_FIELDS};

pub const ENV_FILE: &str = ".env";
const LOCK_FILE: &str = ".lobe-setup.lock";

/// Pipeline stages, in order. Network I/O happens only in `Fetching`,
/// filesystem writes only in `Writing`; everything between is pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Preflight,
    Fetching,
    ResolvingMode,
    GeneratingSecrets,
    Assembling,
    Writing,
    Done,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Preflight => "preflight",
            Phase::Fetching => "fetching artifacts",
            Phase::ResolvingMode => "resolving deployment mode",
            Phase::GeneratingSecrets => "generating secrets",
            Phase::Assembling => "assembling configuration",
            Phase::Writing => "writing files",
            Phase::Done => "done",
        }
    }

    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Preflight => Some(Phase::Fetching),
            Phase::Fetching => Some(Phase::ResolvingMode),
            Phase::ResolvingMode => Some(Phase::GeneratingSecrets),
            Phase::GeneratingSecrets => Some(Phase::Assembling),
            Phase::Assembling => Some(Phase::Writing),
            Phase::Writing => Some(Phase::Done),
            Phase::Done => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An installer failure, tagged with the phase it happened in.
#[derive(Debug, thiserror::Error)]
#[error("{phase} failed: {error}")]
pub struct InstallFailure {
    pub phase: Phase,
    #[source]
    pub error: InstallError,
}

impl InstallFailure {
    pub fn exit_code(&self) -> i32 {
        self.error.exit_code()
    }
}

/// Validated inputs for one run.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub base_url: String,
    pub host: String,
    pub mode: DeployMode,
    pub target_dir: PathBuf,
    pub locale: String,
    pub show_progress: bool,
}

/// What a completed run produced, for the final report.
#[derive(Debug)]
pub struct InstallOutcome {
    pub config: ResolvedConfig,
    pub written: Vec<String>,
    pub skipped: Vec<String>,
    pub generated: Vec<String>,
    pub preserved: Vec<String>,
    pub needs_manual: Vec<String>,
}

/// Drive the full pipeline. Any previously valid installation in the target
/// directory survives a failure untouched: all writes happen last, each one
/// atomically.
pub async fn run(opts: &InstallOptions) -> Result<InstallOutcome, InstallFailure> {
    let mut phase = Phase::Preflight;
    let at = |phase: Phase| move |error: InstallError| InstallFailure { phase, error };

    tracing::info!(phase = %phase, dir = %opts.target_dir.display(), "starting install");
    fs::create_dir_all(&opts.target_dir)
        .map_err(|e| at(phase)(InstallError::fs(&opts.target_dir, e)))?;
    let _lock = LockGuard::acquire(&opts.target_dir).map_err(at(phase))?;

    phase = advance(phase);
    let fetcher = SourceFetcher::new(&opts.base_url).map_err(|e| {
        at(phase)(InstallError::Configuration(format!("cannot build HTTP client: {e}")))
    })?;
    let mut artifacts: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut skipped = Vec::new();
    for spec in artifact_catalog(&opts.locale) {
        let bar = progress_bar(opts.show_progress, &spec.name);
        match fetcher.fetch(&spec).await {
            Ok(bytes) => {
                bar.finish_with_message(format!("{} ({} bytes)", spec.name, bytes.len()));
                artifacts.insert(spec.name.clone(), bytes);
            }
            Err(FetchError::NotFound { .. }) if !spec.required => {
                bar.finish_with_message(format!("{} (not published, skipped)", spec.name));
                tracing::debug!(artifact = %spec.name, "optional artifact missing");
                skipped.push(spec.name.clone());
            }
            Err(err) => {
                bar.abandon_with_message(format!("{} failed", spec.name));
                return Err(at(phase)(err.into()));
            }
        }
    }

    // Prior install state feeds both secret preservation and the merge.
    let env_path = opts.target_dir.join(ENV_FILE);
    let existing: Option<ResolvedConfig> = match fs::read_to_string(&env_path) {
        Ok(content) => Some(parse_env(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(at(phase)(InstallError::fs(&env_path, e))),
    };

    phase = advance(phase);
    tracing::info!(phase = %phase, mode = %opts.mode, host = %opts.host);
    let mode_vars = mode::resolve(opts.mode, &opts.host).map_err(at(phase))?;

    phase = advance(phase);
    let mut generated_secrets = ResolvedConfig::new();
    let mut generated = Vec::new();
    let mut preserved = Vec::new();
    for field in SECRET_FIELDS {
        let prior = existing
            .as_ref()
            .and_then(|env| env.get(field.key))
            .filter(|value| !value.is_empty());
        if prior.is_some() {
            tracing::debug!(key = field.key, "preserving existing secret");
            preserved.push(field.key.to_string());
        } else {
            generated_secrets
                .insert(field.key.to_string(), secrets::generate(field).map_err(at(phase))?);
            generated.push(field.key.to_string());
        }
    }

    phase = advance(phase);
    let template_bytes = &artifacts[".env.example"];
    let template = parse_env(&String::from_utf8_lossy(template_bytes));
    let config =
        assemble(&template, &mode_vars, &generated_secrets, existing.as_ref()).map_err(at(phase))?;

    phase = advance(phase);
    let mut written = Vec::new();
    for (name, bytes) in &artifacts {
        atomic_write(&opts.target_dir.join(name), bytes).map_err(at(phase))?;
        written.push(name.clone());
    }
    atomic_write(&env_path, render_env(&config).as_bytes()).map_err(at(phase))?;
    written.push(ENV_FILE.to_string());

    phase = advance(phase);
    tracing::info!(phase = %phase, files = written.len(), "install complete");
    // Placeholders the operator already filled in are no longer pending.
    let needs_manual = mode_vars
        .needs_manual
        .into_iter()
        .filter(|key| config.get(key).map_or(true, |value| value.is_empty()))
        .collect();
    Ok(InstallOutcome {
        config,
        written,
        skipped,
        generated,
        preserved,
        needs_manual,
    })
}

fn advance(phase: Phase) -> Phase {
    phase.next().unwrap_or(Phase::Done)
}

fn progress_bar(enabled: bool, name: &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner().with_message(name.to_string());
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}

/// Write `bytes` to `path` via a temp file in the same directory plus rename,
/// so an interrupted run leaves either the old file or the new one, never a
/// truncated mixture.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), InstallError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| InstallError::fs(dir, e))?;
    tmp.write_all(bytes).map_err(|e| InstallError::fs(path, e))?;
    tmp.flush().map_err(|e| InstallError::fs(path, e))?;
    tmp.persist(path).map_err(|e| InstallError::fs(path, e.error))?;
    Ok(())
}

/// Sentinel file rejecting a second concurrent run against the same
/// directory. Removed when the guard drops, success or failure.
struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    fn acquire(dir: &Path) -> Result<Self, InstallError> {
        let path = dir.join(LOCK_FILE);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(InstallError::Configuration(format!(
                    "another install appears to be in progress ({} exists); \
                     remove it if no other lobe-setup is running",
                    path.display()
                )))
            }
            Err(e) => Err(InstallError::fs(&path, e)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        fs::remove_file(&self.path).ok();
    }
}
