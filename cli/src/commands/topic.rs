// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Topic key commands
//!
//! Commands: generate, inspect

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use botfactory_swarm::PublicKey;

#[derive(Subcommand)]
pub enum TopicCommand {
    /// Generate a random factory topic
    Generate {
        /// Print the key only
        #[arg(short, long)]
        quiet: bool,
    },

    /// Check that a topic key is well formed
    Inspect {
        /// Topic key as 64 hex characters
        #[arg(value_name = "TOPIC")]
        topic: String,
    },
}

pub async fn handle_command(command: TopicCommand) -> Result<()> {
    match command {
        TopicCommand::Generate { quiet } => {
            let topic = PublicKey::random();
            if quiet {
                println!("{}", topic);
            } else {
                println!("{} {}", "Factory topic:".bold(), topic);
                println!(
                    "{}",
                    "Pin it under spec.factory.topic to keep it across runs.".dimmed()
                );
            }
            Ok(())
        }
        TopicCommand::Inspect { topic } => {
            let key = parse_topic(&topic)?;
            println!("{}", format!("✓ Valid topic: {}", key).green());
            Ok(())
        }
    }
}

fn parse_topic(text: &str) -> Result<PublicKey> {
    text.trim()
        .parse::<PublicKey>()
        .with_context(|| format!("Invalid topic key '{}'", text))
}
