// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use botfactory_swarm::PublicKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Directory inside an install directory under which each bot gets its own
/// working directory, named after its id.
pub const SPAWNED_BOTS_DIR: &str = ".bots";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotId(String);

impl BotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BotId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for BotId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for BotId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a bot's entry point is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotEnvironment {
    /// A native executable.
    Native,
    /// A script run by an interpreter (`node`).
    #[default]
    Interpreted,
    /// A page run by a headless browser runner.
    Browser,
}

impl BotEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotEnvironment::Native => "native",
            BotEnvironment::Interpreted => "interpreted",
            BotEnvironment::Browser => "browser",
        }
    }
}

impl fmt::Display for BotEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BotEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(BotEnvironment::Native),
            "interpreted" | "node" => Ok(BotEnvironment::Interpreted),
            "browser" => Ok(BotEnvironment::Browser),
            other => Err(format!(
                "Unknown bot environment '{}'. Supported: native, interpreted, browser",
                other
            )),
        }
    }
}

/// Everything needed to start (and later restart) a bot process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchInfo {
    /// Reference the source resolver was asked for.
    pub install_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub environment: BotEnvironment,
    pub install_directory: PathBuf,
    /// Always `<install_directory>/.bots/<bot_id>`.
    pub working_directory: PathBuf,
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Extra variables for the child on top of the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl LaunchInfo {
    pub fn working_directory_for(install_directory: &std::path::Path, bot_id: &BotId) -> PathBuf {
        install_directory.join(SPAWNED_BOTS_DIR).join(bot_id.as_str())
    }
}

/// Transport-safe projection of a supervised bot. Process and watch handles
/// never leave the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotView {
    pub bot_id: BotId,
    pub install_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub environment: BotEnvironment,
    pub working_directory: PathBuf,
    pub command: String,
    pub arguments: Vec<String>,
    #[serde(default)]
    pub parties: Vec<PublicKey>,
    pub started: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub stopped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Invalid bot: {0}")]
    UnresolvedBot(String),
    #[error("Bot not found: {0}")]
    UnknownBot(BotId),
    #[error("Filesystem error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to start '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to watch {path:?}: {reason}")]
    Watch { path: PathBuf, reason: String },
}

impl ContainerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ContainerError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_bot_ids_are_unique() {
        let a = BotId::new();
        let b = BotId::new();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_working_directory_layout() {
        let dir = LaunchInfo::working_directory_for(Path::new("/srv/bots/echo"), &BotId::from("b-001"));
        assert_eq!(dir, PathBuf::from("/srv/bots/echo/.bots/b-001"));
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("node".parse::<BotEnvironment>().unwrap(), BotEnvironment::Interpreted);
        assert_eq!("Native".parse::<BotEnvironment>().unwrap(), BotEnvironment::Native);
        assert!("wasm".parse::<BotEnvironment>().is_err());
    }
}
