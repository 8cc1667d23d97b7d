// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Bot Factory CLI
//!
//! The `botfactory` binary manages factory configuration and runs bots in an
//! embedded factory.
//!
//! ## Commands
//!
//! - `botfactory bot run|purge` - Spawn and supervise a local bot
//! - `botfactory topic generate|inspect` - Factory topic keys
//! - `botfactory config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use botfactory_cli::commands::{self, BotCommand, ConfigCommand, TopicCommand};

/// Bot Factory - spawn and supervise bots commanded over the swarm
#[derive(Parser)]
#[command(name = "botfactory")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "BOTFACTORY_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "BOTFACTORY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run and manage bots
    #[command(name = "bot")]
    Bot {
        #[command(subcommand)]
        command: BotCommand,
    },

    /// Factory topic keys
    #[command(name = "topic")]
    Topic {
        #[command(subcommand)]
        command: TopicCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap so env-backed flags see it
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    if let Ok(path) = dotenv {
        debug!("Loaded environment from {:?}", path);
    }

    match cli.command {
        Some(Commands::Bot { command }) => commands::bot::handle_command(command, cli.config).await,
        Some(Commands::Topic { command }) => commands::topic::handle_command(command).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
