pub mod config;
pub mod generate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use pw_domain::cost::ModelTier;

/// Pagewright: conversational landing-page generation.
#[derive(Debug, Parser)]
#[command(name = "pagewright", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate a page from a one-line request and print the component.
    Generate {
        /// What the page is for, e.g. "a landing page for my bakery".
        request: String,
        /// Model tier to use.
        #[arg(long, value_enum, default_value_t = TierArg::Standard)]
        tier: TierArg,
        /// JSON file with a business context (businessName, industry, ...).
        #[arg(long)]
        context: Option<PathBuf>,
        /// Write the component here instead of stdout.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TierArg {
    Standard,
    Premium,
}

impl From<TierArg> for ModelTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Standard => ModelTier::Standard,
            TierArg::Premium => ModelTier::Premium,
        }
    }
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `PW_CONFIG` (or `config.toml`
/// by default). A missing file yields the defaults. Returns the parsed
/// [`Config`](pw_domain::config::Config) and the path that was used.
pub fn load_config() -> anyhow::Result<(pw_domain::config::Config, String)> {
    let config_path = std::env::var("PW_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(std::path::Path::new(&config_path))?;
    Ok((config, config_path))
}

pub fn load_config_from(path: &std::path::Path) -> anyhow::Result<pw_domain::config::Config> {
    if !path.exists() {
        return Ok(pw_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))
}
