//! CLI module for Arbiter
//!
//! Command-line interface definitions and handlers for the Arbiter model router.
//!
//! # Commands
//!
//! - `serve` - Start the routing server
//! - `models` - List models declared in a configuration file
//! - `rules` - List routing rules declared in a configuration file
//! - `config` - Configuration utilities (init, validate)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Start server with default config
//! arbiter serve
//!
//! # Check a config file before deploying it
//! arbiter config validate -c arbiter.toml
//!
//! # Generate shell completions
//! arbiter completions bash > ~/.bash_completion.d/arbiter
//! ```

pub mod completions;
pub mod config;
pub mod models;
pub mod output;
pub mod rules;
pub mod serve;

pub use completions::handle_completions;
pub use config::{handle_config_init, handle_config_validate};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Arbiter - Multi-model request router
#[derive(Parser, Debug)]
#[command(
    name = "arbiter",
    version,
    about = "Rule-driven router for AI model requests"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Arbiter server
    Serve(ServeArgs),
    /// List configured models
    Models(ModelsArgs),
    /// List configured routing rules
    Rules(RulesArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "arbiter.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "ARBITER_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "ARBITER_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "ARBITER_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Args, Debug)]
pub struct ModelsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Filter by provider
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "arbiter.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Hide disabled rules
    #[arg(long)]
    pub enabled_only: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "arbiter.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
    /// Parse and validate a configuration file
    Validate(ConfigValidateArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "arbiter.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigValidateArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "arbiter.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
