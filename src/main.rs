use arbiter::cli::{
    handle_completions, handle_config_init, handle_config_validate, models, rules, Cli,
    Commands, ConfigCommands,
};
use arbiter::config::ArbiterConfig;
use clap::Parser;
use std::path::Path;

fn load_config(path: &Path) -> Result<ArbiterConfig, Box<dyn std::error::Error>> {
    Ok(ArbiterConfig::load(Some(path))?)
}

fn print_output(
    result: Result<String, Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = result?;
    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => arbiter::cli::serve::run_serve(args).await,
        Commands::Models(args) => print_output(
            load_config(&args.config).and_then(|config| models::handle_models(&args, &config)),
        ),
        Commands::Rules(args) => print_output(
            load_config(&args.config).and_then(|config| rules::handle_rules(&args, &config)),
        ),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
            ConfigCommands::Validate(args) => print_output(handle_config_validate(&args)),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
