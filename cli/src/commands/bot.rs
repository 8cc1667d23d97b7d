// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bot commands
//!
//! Commands: run, purge

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use botfactory_core::{
    domain::{node_config::FactoryConfig, protocol::SpawnOptions, source::SourceResolver},
    infrastructure::{event_bus::EventBusError, source::LocalSourceResolver},
    BotEnvironment, BotEvent,
};

use crate::embedded::EmbeddedFactory;

#[derive(Subcommand)]
pub enum BotCommand {
    /// Spawn an installed bot in an embedded factory and supervise it
    Run {
        /// Install reference (directory under the bots root)
        #[arg(value_name = "INSTALL_REF")]
        install_ref: String,

        /// Display name (default: install reference)
        #[arg(short, long)]
        name: Option<String>,

        /// Runtime environment: native, interpreted or browser
        #[arg(short = 'E', long, default_value = "interpreted")]
        environment: BotEnvironment,

        /// Extra environment for the bot process (KEY=VALUE, repeatable)
        #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,

        /// Bots root (overrides spec.bots.root)
        #[arg(long, value_name = "DIR")]
        bots_dir: Option<PathBuf>,
    },

    /// Remove every installed bot source under the bots root
    Purge {
        /// Skip the confirmation check
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn handle_command(command: BotCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = FactoryConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    match command {
        BotCommand::Run {
            install_ref,
            name,
            environment,
            env,
            bots_dir,
        } => {
            let mut config = config;
            if let Some(dir) = bots_dir {
                config.spec.bots.root = dir;
            }
            let options = SpawnOptions {
                install_ref: None,
                environment,
                name,
                env: env.into_iter().collect::<BTreeMap<_, _>>(),
            };
            let code = run(&config, &install_ref, options).await?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        BotCommand::Purge { yes } => purge(&config, yes).await,
    }
}

/// Spawn one bot and block until it exits or the user interrupts.
/// Returns the exit code to propagate.
async fn run(config: &FactoryConfig, install_ref: &str, options: SpawnOptions) -> Result<i32> {
    let embedded = EmbeddedFactory::start(config).await?;
    let mut events = embedded.factory().container().subscribe();

    println!(
        "Spawning {} ({}) from {}",
        install_ref.bold(),
        options.environment,
        config.spec.bots.root.display()
    );
    let bot_id = match embedded.client().spawn(install_ref, options).await {
        Ok(bot_id) => bot_id,
        Err(e) => {
            embedded.shutdown(1).await?;
            return Err(e).context("Failed to spawn bot");
        }
    };
    let view = embedded.factory().container().describe(&bot_id)?;
    println!("{}", format!("✓ Bot started: {}", bot_id).green());
    println!("  PID: {}", view.pid.map_or("-".to_string(), |pid| pid.to_string()));
    println!("  Working directory: {}", view.working_directory.display());
    println!("  Control topic: {}", embedded.topic());
    println!("{}", "Press Ctrl-C to stop.".dimmed());

    let code = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping bot {}", bot_id);
                break 0;
            }
            event = events.recv() => match event {
                Ok(BotEvent::Closed { bot_id: closed, exit_code }) if closed == bot_id => {
                    match exit_code {
                        Some(0) => println!("{}", "✓ Bot exited".green()),
                        Some(code) => println!("{}", format!("✗ Bot exited with code {}", code).red()),
                        None => println!("{}", "✗ Bot was terminated by a signal".red()),
                    }
                    break exit_code.unwrap_or(1);
                }
                Ok(_) => continue,
                Err(EventBusError::Lagged(n)) => {
                    warn!("Missed {} bot events", n);
                    continue;
                }
                Err(e) => {
                    warn!("Bot event stream ended: {}", e);
                    break 1;
                }
            },
        }
    };

    embedded.shutdown(code).await
}

async fn purge(config: &FactoryConfig, confirmed: bool) -> Result<()> {
    let root = &config.spec.bots.root;
    if !confirmed {
        println!(
            "{}",
            format!("This removes every bot installed under {}.", root.display()).yellow()
        );
        println!("Re-run with --yes to continue.");
        return Ok(());
    }

    LocalSourceResolver::from_settings(&config.spec.bots)
        .purge()
        .await
        .with_context(|| format!("Failed to purge {}", root.display()))?;
    println!("{}", format!("✓ Purged {}", root.display()).green());
    Ok(())
}

fn parse_env_pair(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("LOG=debug=1").unwrap(),
            ("LOG".to_string(), "debug=1".to_string())
        );
        assert_eq!(parse_env_pair("EMPTY=").unwrap(), ("EMPTY".to_string(), String::new()));
        assert!(parse_env_pair("=value").is_err());
        assert!(parse_env_pair("novalue").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_returns_bot_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("quitter");
        std::fs::create_dir_all(&dir).unwrap();
        let main = dir.join("main");
        std::fs::write(&main, "#!/bin/sh\nexit 7\n").unwrap();
        std::fs::set_permissions(&main, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = FactoryConfig::default();
        config.spec.bots.root = root.path().to_path_buf();

        let options = SpawnOptions {
            environment: BotEnvironment::Native,
            ..Default::default()
        };
        let code = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            run(&config, "quitter", options),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(code, 7);
    }

    #[tokio::test]
    async fn test_purge_requires_confirmation() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("keep")).unwrap();

        let mut config = FactoryConfig::default();
        config.spec.bots.root = root.path().to_path_buf();

        purge(&config, false).await.unwrap();
        assert!(root.path().join("keep").exists());

        purge(&config, true).await.unwrap();
        assert!(!root.path().join("keep").exists());
    }
}
