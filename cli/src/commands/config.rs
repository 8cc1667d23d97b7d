// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use botfactory_core::domain::node_config::FactoryConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./botfactory-config.yaml)
        #[arg(short, long, default_value = "./botfactory-config.yaml")]
        output: PathBuf,

        /// Pin a freshly generated factory topic in the file
        #[arg(long)]
        with_topic: bool,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate {
            output,
            with_topic,
            force,
        } => generate(output, with_topic, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = FactoryConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. BOTFACTORY_CONFIG_PATH: {}",
            std::env::var("BOTFACTORY_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./botfactory-config.yaml");
        println!("  4. ~/.botfactory/config.yaml");
        println!("  5. /etc/botfactory/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Factory:".bold());
    println!("  Name: {}", config.metadata.name);
    match &config.spec.factory.topic {
        Some(topic) => println!("  Topic: {}", topic),
        None => println!("  Topic: {}", "(random per run)".dimmed()),
    }
    println!();

    let bots = &config.spec.bots;
    println!("{}", "Bots:".bold());
    println!("  Root: {}", bots.root.display());
    println!("  Interpreter: {}", bots.interpreter);
    println!(
        "  NODE_PATH: {}",
        bots.node_path.as_deref().unwrap_or("(inherited)")
    );
    println!(
        "  Browser runner: {}",
        bots.browser_runner.as_deref().unwrap_or("(none)")
    );
    println!();

    let client = &config.spec.client;
    println!("{}", "Client:".bold());
    println!("  Connect timeout: {}s", client.connect_timeout_secs);
    match client.request_timeout_secs {
        Some(secs) => println!("  Request timeout: {}s", secs),
        None => println!("  Request timeout: {}", "(unbounded)".dimmed()),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = FactoryConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_topic: bool, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let config = sample_config(with_topic);
    config
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn sample_config(with_topic: bool) -> FactoryConfig {
    let mut config = FactoryConfig::default();
    if with_topic {
        config.spec.factory.topic = Some(botfactory_swarm::PublicKey::random());
    }
    config
}
