mod assemble;
mod cli;
mod error;
mod fetch;
mod install;
mod mode;
mod prefs;
mod report;
mod secrets;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use dialoguer::{Confirm, Input, Select};

use cli::Cli;
use install::InstallOptions;
use mode::DeployMode;
use prefs::Prefs;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut prefs = Prefs::load();
    if let Some(lang) = &cli.lang {
        prefs.locale = lang.clone();
    }

    let opts = match resolve_options(&cli, &prefs) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(3);
        }
    };

    match install::run(&opts).await {
        Ok(outcome) => {
            report::print_summary(&opts, &outcome);
            prefs.remember(&opts.target_dir, opts.mode.as_str());
            prefs.save();
        }
        Err(failure) => {
            eprintln!("Error: {failure}");
            std::process::exit(failure.exit_code());
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "lobe_setup=debug" } else { "lobe_setup=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Fill anything not given by flags, prompting unless `--yes`.
fn resolve_options(cli: &Cli, prefs: &Prefs) -> Result<InstallOptions> {
    let target_dir = resolve_target_dir(cli, prefs)?;
    let mode = resolve_mode(cli, prefs)?;
    let host = resolve_host(cli, mode)?;

    Ok(InstallOptions {
        base_url: cli.url.trim_end_matches('/').to_string(),
        host,
        mode,
        target_dir,
        locale: prefs.locale.clone(),
        show_progress: !cli.yes,
    })
}

fn resolve_target_dir(cli: &Cli, prefs: &Prefs) -> Result<PathBuf> {
    let default_dir = cli
        .dir
        .clone()
        .or_else(|| prefs.last_install_dir.clone())
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join("lobe-chat-db"));

    if cli.dir.is_some() || cli.yes {
        return Ok(default_dir);
    }

    let answer: String = Input::<String>::new()
        .with_prompt("Install directory")
        .default(default_dir.display().to_string())
        .interact_text()?;
    let dir = PathBuf::from(answer);

    if dir.exists() {
        let proceed = Confirm::new()
            .with_prompt(format!("{} already exists, install into it?", dir.display()))
            .default(true)
            .interact()?;
        if !proceed {
            bail!("setup cancelled");
        }
    }
    Ok(dir)
}

fn resolve_mode(cli: &Cli, prefs: &Prefs) -> Result<DeployMode> {
    if let Some(raw) = &cli.mode {
        return Ok(raw.parse()?);
    }
    let last_mode = prefs.last_mode.as_deref().and_then(|m| m.parse::<DeployMode>().ok());
    if cli.yes {
        return Ok(last_mode.unwrap_or(DeployMode::Local));
    }

    let default_index = last_mode
        .and_then(|m| DeployMode::ALL.iter().position(|candidate| *candidate == m))
        .unwrap_or(0);
    let labels: Vec<&str> = DeployMode::ALL.iter().map(|m| m.describe()).collect();
    let index = Select::new()
        .with_prompt("Deployment mode")
        .items(&labels)
        .default(default_index)
        .interact()?;
    Ok(DeployMode::ALL[index])
}

fn resolve_host(cli: &Cli, mode: DeployMode) -> Result<String> {
    const DEFAULT_HOST: &str = "http://localhost:3210";

    if let Some(host) = &cli.host {
        return Ok(host.clone());
    }
    if cli.yes {
        // Remote mode stays empty here so the resolver reports the real error.
        return Ok(match mode {
            DeployMode::Remote => String::new(),
            _ => DEFAULT_HOST.to_string(),
        });
    }

    let mut prompt = Input::<String>::new().with_prompt("Public host");
    if mode != DeployMode::Remote {
        prompt = prompt.default(DEFAULT_HOST.to_string());
    }
    Ok(prompt.interact_text()?)
}
