//! Config command handlers

use crate::cli::{ConfigInitArgs, ConfigValidateArgs};
use crate::config::ArbiterConfig;
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../arbiter.example.toml");

/// Handle `arbiter config init` command
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "File already exists: {}. Use --force to overwrite.",
            args.output.display()
        )
        .into());
    }

    fs::write(&args.output, EXAMPLE_CONFIG)?;

    println!("✓ Configuration file created: {}", args.output.display());
    println!("  Edit this file to declare your models and routing rules.");

    Ok(())
}

/// Handle `arbiter config validate` command
///
/// Returns a one-line summary on success.
pub fn handle_config_validate(
    args: &ConfigValidateArgs,
) -> Result<String, Box<dyn std::error::Error>> {
    let config = ArbiterConfig::load(Some(&args.config))?;
    config.validate()?;

    Ok(format!(
        "✓ {} is valid: {} models, {} rules, {} agent profiles, {} workspaces",
        args.config.display(),
        config.models.len(),
        config.rules.len(),
        config.agents.len(),
        config.workspaces.len()
    ))
}
