use std::path::PathBuf;

use clap::Parser;

/// Upstream raw-content root the deployment artifacts are published under.
pub const DEFAULT_SOURCE_URL: &str = "https://raw.githubusercontent.com/lobehub/lobe-chat/main";

#[derive(Parser, Debug)]
#[command(
    name = "lobe-setup",
    version,
    about = "Provision a self-hosted LobeChat docker-compose deployment"
)]
pub struct Cli {
    /// Base URL deployment artifacts are fetched from
    #[arg(long, value_name = "URL", default_value = DEFAULT_SOURCE_URL)]
    pub url: String,

    /// Public host of the deployment (e.g. http://localhost:3210)
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Installation directory (default: ~/lobe-chat-db, or the last one used)
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Deployment mode: local, remote or s3
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Locale of the fetched env template (en or zh-CN)
    #[arg(short = 'l', long = "lang", value_name = "LOCALE")]
    pub lang: Option<String>,

    /// Accept defaults instead of prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Show debug output
    #[arg(short, long)]
    pub verbose: bool,
}
