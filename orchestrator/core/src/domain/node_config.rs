// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Factory Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - the factory's control topic
// - where installed bot sources live and how interpreted/browser bots launch
// - client-side connection and request timeouts

use botfactory_swarm::Topic;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "botfactory/v1";
pub const KIND: &str = "FactoryConfig";

/// Top-level factory configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// API version (must be "botfactory/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "FactoryConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: FactoryConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactoryConfigSpec {
    #[serde(default)]
    pub factory: FactorySettings,

    #[serde(default)]
    pub bots: BotSettings,

    #[serde(default)]
    pub client: ClientSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactorySettings {
    /// Control topic (hex). A random topic is generated at startup when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<Topic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Directory holding one install directory per bot reference
    #[serde(default = "default_bots_root")]
    pub root: PathBuf,

    /// Module resolution path handed to non-native bots as NODE_PATH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_path: Option<String>,

    /// Interpreter for `interpreted` bots
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Runner for `browser` bots; browser bots are unavailable when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_runner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-call deadline; `null` waits indefinitely
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: Option<u64>,
}

impl ClientSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn default_bots_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".botfactory").join("bots"))
        .unwrap_or_else(|| PathBuf::from("./bots"))
}

fn default_interpreter() -> String {
    "node".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_request_timeout() -> Option<u64> {
    Some(60)
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            root: default_bots_root(),
            node_path: None,
            interpreter: default_interpreter(),
            browser_runner: None,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "botfactory".to_string(),
                labels: None,
            },
            spec: FactoryConfigSpec::default(),
        }
    }
}

impl FactoryConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.to_yaml_string()?)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. BOTFACTORY_CONFIG_PATH environment variable
    /// 2. ./botfactory-config.yaml (working directory)
    /// 3. ~/.botfactory/config.yaml (user home)
    /// 4. /etc/botfactory/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("BOTFACTORY_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./botfactory-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".botfactory").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/botfactory/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // An explicit path must exist and parse.
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::debug!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply BOTFACTORY_* environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("BOTFACTORY_BOTS_DIR") {
            tracing::info!("Environment override: BOTFACTORY_BOTS_DIR={}", dir);
            self.spec.bots.root = PathBuf::from(dir);
        }

        if let Some(node_path) = lookup("BOTFACTORY_NODE_PATH") {
            tracing::info!("Environment override: BOTFACTORY_NODE_PATH={}", node_path);
            self.spec.bots.node_path = Some(node_path);
        }

        if let Some(val) = lookup("BOTFACTORY_CONNECT_TIMEOUT_SECS") {
            match val.trim().parse::<u64>() {
                Ok(secs) => {
                    tracing::info!("Environment override: BOTFACTORY_CONNECT_TIMEOUT_SECS={}", secs);
                    self.spec.client.connect_timeout_secs = secs;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for BOTFACTORY_CONNECT_TIMEOUT_SECS: '{}'. Expected seconds. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.bots.root.as_os_str().is_empty() {
            anyhow::bail!("spec.bots.root cannot be empty");
        }

        if self.spec.bots.interpreter.trim().is_empty() {
            anyhow::bail!("spec.bots.interpreter cannot be empty");
        }

        if self.spec.client.connect_timeout_secs == 0 {
            anyhow::bail!("spec.client.connect_timeout_secs must be greater than zero");
        }

        if self.spec.client.request_timeout_secs == Some(0) {
            anyhow::bail!("spec.client.request_timeout_secs must be greater than zero or null");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botfactory_swarm::PublicKey;

    #[test]
    fn test_default_manifest() {
        let config = FactoryConfig::default();
        assert_eq!(config.api_version, "botfactory/v1");
        assert_eq!(config.kind, "FactoryConfig");
        assert_eq!(config.spec.client.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.spec.client.request_timeout(), Some(Duration::from_secs(60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_parsing() {
        let topic = PublicKey::new([7; 32]);
        let yaml = format!(
            r#"
apiVersion: botfactory/v1
kind: FactoryConfig
metadata:
  name: lab-factory
spec:
  factory:
    topic: "{}"
  bots:
    root: /srv/bots
    node_path: /srv/node_modules
    browser_runner: /usr/local/bin/bot-browser
  client:
    connect_timeout_secs: 5
    request_timeout_secs: null
"#,
            topic
        );

        let config = FactoryConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.metadata.name, "lab-factory");
        assert_eq!(config.spec.factory.topic, Some(topic));
        assert_eq!(config.spec.bots.root, PathBuf::from("/srv/bots"));
        assert_eq!(config.spec.bots.interpreter, "node");
        assert_eq!(config.spec.client.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.spec.client.request_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_preserves_fields() {
        let mut config = FactoryConfig::default();
        config.spec.bots.node_path = Some("/opt/modules".to_string());
        let yaml = config.to_yaml_string().unwrap();
        let back = FactoryConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(back.spec.bots.node_path.as_deref(), Some("/opt/modules"));
        assert_eq!(back.spec.bots.root, config.spec.bots.root);
    }

    #[test]
    fn test_overrides() {
        let mut config = FactoryConfig::default();
        config.apply_overrides(|key| match key {
            "BOTFACTORY_BOTS_DIR" => Some("/tmp/bots".to_string()),
            "BOTFACTORY_NODE_PATH" => Some("/tmp/node".to_string()),
            "BOTFACTORY_CONNECT_TIMEOUT_SECS" => Some("12".to_string()),
            _ => None,
        });
        assert_eq!(config.spec.bots.root, PathBuf::from("/tmp/bots"));
        assert_eq!(config.spec.bots.node_path.as_deref(), Some("/tmp/node"));
        assert_eq!(config.spec.client.connect_timeout_secs, 12);
    }

    #[test]
    fn test_invalid_override_is_ignored() {
        let mut config = FactoryConfig::default();
        config.apply_overrides(|key| {
            (key == "BOTFACTORY_CONNECT_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert_eq!(config.spec.client.connect_timeout_secs, 30);
    }

    #[test]
    fn test_validation() {
        let mut config = FactoryConfig::default();
        config.api_version = "v0".to_string();
        assert!(config.validate().is_err());

        let mut config = FactoryConfig::default();
        config.kind = "NodeConfig".to_string();
        assert!(config.validate().is_err());

        let mut config = FactoryConfig::default();
        config.spec.client.connect_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = FactoryConfig::default();
        config.spec.client.request_timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }
}
