use crate::install::{InstallOptions, InstallOutcome};
use crate::secrets::SECRET_FIELDS;

/// Mask a secret value showing only the last 4 characters.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = value.chars().skip(count - 4).collect();
    format!("****{tail}")
}

/// Print the post-install summary: files written, credentials (masked),
/// and any keys the operator still has to fill in.
pub fn print_summary(opts: &InstallOptions, outcome: &InstallOutcome) {
    println!();
    println!("Installation complete: {}", opts.target_dir.display());
    println!("  Mode: {}", opts.mode);
    if let Some(url) = outcome.config.get("APP_URL") {
        println!("  App URL: {url}");
    }

    println!("  Files written:");
    for file in &outcome.written {
        println!("    - {file}");
    }
    for file in &outcome.skipped {
        println!("    - {file} (not published, skipped)");
    }

    if !outcome.generated.is_empty() || !outcome.preserved.is_empty() {
        println!("  Secrets:");
        for field in SECRET_FIELDS {
            let Some(value) = outcome.config.get(field.key) else { continue };
            let origin = if outcome.preserved.iter().any(|k| k == field.key) {
                "preserved"
            } else {
                "generated"
            };
            println!("    {} = {} ({origin})", field.key, mask_secret(value));
        }
    }

    if !outcome.needs_manual.is_empty() {
        println!("  Requires manual completion in .env:");
        for key in &outcome.needs_manual {
            println!("    - {key}");
        }
    }

    println!();
    println!("Next step: cd {} && docker compose up -d", opts.target_dir.display());
}
