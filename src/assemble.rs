use std::collections::BTreeMap;

use crate::error::InstallError;
use crate::mode::{ModeVars, HOST_DERIVED_KEYS};

/// The fully merged environment: one value per configuration key.
pub type ResolvedConfig = BTreeMap<String, String>;

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are ignored;
/// matching surrounding quotes are stripped from values.
pub fn parse_env(input: &str) -> ResolvedConfig {
    let mut out = ResolvedConfig::new();
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        out.insert(key.trim().to_string(), unquote(value.trim()));
    }
    out
}

/// Inverse of the quoting `render_env` applies: strips one pair of
/// surrounding quotes and, for single-quoted values, decodes the `'\''`
/// escape so quoted values survive a write/read cycle verbatim.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].replace(r"'\''", "'");
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return value[1..value.len() - 1].to_string();
    }
    value.to_string()
}

/// Serialize a resolved config back to env-file form, quoting values that
/// contain shell-sensitive characters.
pub fn render_env(config: &ResolvedConfig) -> String {
    let mut out = String::from("# Generated by lobe-setup. Secret values are preserved on re-run.\n");
    for (key, value) in config {
        if needs_quoting(value) {
            out.push_str(&format!("{}='{}'\n", key, value.replace('\'', r"'\''")));
        } else {
            out.push_str(&format!("{}={}\n", key, value));
        }
    }
    out
}

fn needs_quoting(value: &str) -> bool {
    !value.chars().all(|c| c.is_ascii_alphanumeric() || "_./:@%+,=-".contains(c))
}

/// Merge template defaults, mode variables, generated secrets and the
/// previous install's values into the final config.
///
/// Later layers win, with two exceptions: non-empty values from the existing
/// install are kept for idempotency, and host-derived keys always reflect the
/// current run. Any key left empty that the mode did not flag as
/// operator-filled is a catalog/template mismatch and fails the run.
pub fn assemble(
    template: &ResolvedConfig,
    mode_vars: &ModeVars,
    secrets: &ResolvedConfig,
    existing: Option<&ResolvedConfig>,
) -> Result<ResolvedConfig, InstallError> {
    let mut out = template.clone();

    for (key, value) in &mode_vars.vars {
        out.insert(key.clone(), value.clone());
    }
    for (key, value) in secrets {
        out.insert(key.clone(), value.clone());
    }
    if let Some(existing) = existing {
        for (key, value) in existing {
            if value.is_empty() || HOST_DERIVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if out.contains_key(key) {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    for (key, value) in &out {
        if value.is_empty() && !mode_vars.needs_manual.contains(key) {
            return Err(InstallError::IncompleteConfiguration { key: key.clone() });
        }
    }
    Ok(out)
}
