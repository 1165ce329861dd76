//! bwcache - Bitwarden lookups with a shared in-memory cache
//!
//! CLI entry point that dispatches to subcommands.

use bwcache::cli::commands;
use bwcache::cli::{Cli, Commands};
use bwcache::config::ConfigManager;
use bwcache::error::{BwcacheError, BwcacheResult};
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
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

async fn run() -> BwcacheResult<()> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("bwcache=warn"),
        1 => EnvFilter::new("bwcache=info"),
        _ => EnvFilter::new("bwcache=debug"),
    };

    // Completions need neither config nor logging
    if let Commands::Completions(args) = cli.command {
        return commands::completions(args);
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| BwcacheError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let mut config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    if let Some(dir) = cli.cache_dir {
        config.cache.directory = Some(dir);
    }
    if let Some(program) = cli.bw {
        config.bitwarden.program = program;
    }

    // Logs go to stderr so lookup output on stdout stays clean
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if let Some(ref path) = local_config_path {
        debug!("Found local config: {}", path.display());
    }

    bwcache::ui::init_theme();

    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Lookup(args) => commands::lookup(args, &config).await,
        Commands::Attachment(args) => commands::attachment(args, &config).await,
        Commands::WriteAttachment(args) => commands::write_attachment(args, &config).await,
        Commands::Sync => commands::sync(&config).await,
        Commands::Cache(args) => commands::cache(args, &config).await,
        Commands::Config(args) => commands::config(args, &config, &config_manager).await,
    }
}
