//! # pathglue CLI
//!
//! Replay recorded inode traces and exercise the tracker under load.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pathglue_config::{log_cli_debug, Config};

mod replay;
mod stress;

/// pathglue - inode-to-path tracking for FUSE clients
#[derive(Parser)]
#[command(name = "pathglue")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON Lines event trace against a fresh tracker
    Replay(replay::ReplayArgs),

    /// Run concurrent lookup/forget rounds and verify nothing leaks
    Stress(stress::StressArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file locations
    Path,
    /// Write the default configuration to the global config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    pathglue_config::reload().context("failed to load configuration")?;
    let config = pathglue_config::config().clone();
    pathglue_config::init_logging(config.log.level);
    log_cli_debug!("Configuration loaded", level = config.log.level.as_filter());

    match cli.command {
        Commands::Replay(args) => replay::run(args, &config),
        Commands::Stress(args) => stress::run(args, &config),
        Commands::Config { command } => cmd_config(command, &config),
    }
}

fn cmd_config(command: ConfigCommands, config: &Config) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        ConfigCommands::Path => {
            let global = Config::global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<no home directory>".to_string());
            println!("Global:  {}", global);
            println!("Project: {}", pathglue_config::PROJECT_CONFIG_PATH);
            Ok(())
        }
        ConfigCommands::Init { force } => {
            let path: PathBuf =
                Config::global_config_path().context("cannot determine home directory")?;
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, Config::default_toml()?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}
