//! pkgstore - local package cache maintenance
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use pkgstore::cli::{commands, Cli, Commands};
use pkgstore::config::{Config, ConfigManager};
use pkgstore::error::StoreResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> StoreResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let file_config = config_manager.load()?;
    init_logging(cli.verbose, &file_config);

    let mut config = file_config.clone();
    if let Some(store) = cli.store {
        debug!("Store overridden: {}", store.display());
        config.storage.path = Some(store);
    }

    match cli.command {
        Commands::Revisions(args) => commands::revisions(args, &config),
        Commands::Latest(args) => commands::latest(args, &config),
        Commands::Path(args) => commands::path(args, &config),
        Commands::Export(args) => commands::export(args, &config),
        Commands::Remove(args) => commands::remove(args, &config),
        Commands::Outdated(args) => commands::outdated(args, &config),
        Commands::Fetch(args) => commands::fetch(args, &config),
        Commands::Config(args) => commands::config(args, &config_manager, &file_config),
        Commands::Completions(args) => commands::completions(args),
    }
}

/// 0 = warn, 1 = info, 2+ = debug; logs go to stderr
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("pkgstore=warn"),
        1 => EnvFilter::new("pkgstore=info"),
        _ => EnvFilter::new("pkgstore=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if config.general.json_logs() {
        builder.json().init();
    } else {
        builder.init();
    }
}
