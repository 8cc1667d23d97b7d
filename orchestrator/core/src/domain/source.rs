// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::bot::{BotEnvironment, BotId, ContainerError};
use crate::domain::protocol::SpawnOptions;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where a bot's sources live once installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotPathInfo {
    pub install_directory: PathBuf,
    pub environment: BotEnvironment,
}

/// Command line for a resolved bot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchCommand {
    pub command: String,
    pub arguments: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Finds installed bot sources and knows how to launch them.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Locate the install directory for `install_ref`. `Ok(None)` means the
    /// reference is unknown.
    async fn resolve(
        &self,
        bot_id: &BotId,
        install_ref: &str,
        environment: BotEnvironment,
        options: &SpawnOptions,
    ) -> Result<Option<BotPathInfo>, ContainerError>;

    fn command(&self, info: &BotPathInfo) -> LaunchCommand;

    /// Remove every installed source.
    async fn purge(&self) -> Result<(), ContainerError>;
}
