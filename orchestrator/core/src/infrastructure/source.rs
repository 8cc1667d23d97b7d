// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Local Source Resolver
//
// Bots are expected to be installed already, one directory per reference:
//
//   <bots_root>/<install_ref>/main         native
//   <bots_root>/<install_ref>/main.js      interpreted
//   <bots_root>/<install_ref>/index.html   browser
//
// Nothing is downloaded. Purging removes every install directory.

use crate::domain::bot::{BotEnvironment, BotId, ContainerError};
use crate::domain::node_config::BotSettings;
use crate::domain::protocol::SpawnOptions;
use crate::domain::source::{BotPathInfo, LaunchCommand, SourceResolver};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

pub const NATIVE_MAIN_FILE: &str = "main";
pub const INTERPRETED_MAIN_FILE: &str = "main.js";
pub const BROWSER_MAIN_FILE: &str = "index.html";

#[derive(Debug, Clone)]
pub struct LocalSourceResolver {
    bots_root: PathBuf,
    interpreter: String,
    browser_runner: Option<String>,
}

impl LocalSourceResolver {
    pub fn new(bots_root: impl Into<PathBuf>) -> Self {
        Self {
            bots_root: bots_root.into(),
            interpreter: "node".to_string(),
            browser_runner: None,
        }
    }

    pub fn from_settings(settings: &BotSettings) -> Self {
        Self {
            bots_root: settings.root.clone(),
            interpreter: settings.interpreter.clone(),
            browser_runner: settings.browser_runner.clone(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_browser_runner(mut self, runner: impl Into<String>) -> Self {
        self.browser_runner = Some(runner.into());
        self
    }

    pub fn bots_root(&self) -> &Path {
        &self.bots_root
    }

    /// Install references are relative paths below the bots root. Anything
    /// that could escape it is rejected.
    fn install_directory(&self, install_ref: &str) -> Option<PathBuf> {
        let reference = Path::new(install_ref);
        let contained = !install_ref.is_empty()
            && reference
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        contained.then(|| self.bots_root.join(reference))
    }
}

#[async_trait]
impl SourceResolver for LocalSourceResolver {
    async fn resolve(
        &self,
        bot_id: &BotId,
        install_ref: &str,
        environment: BotEnvironment,
        _options: &SpawnOptions,
    ) -> Result<Option<BotPathInfo>, ContainerError> {
        let Some(install_directory) = self.install_directory(install_ref) else {
            debug!(bot_id = %bot_id, "Rejected install reference '{}'", install_ref);
            return Ok(None);
        };

        if environment == BotEnvironment::Browser && self.browser_runner.is_none() {
            debug!(bot_id = %bot_id, "No browser runner configured for '{}'", install_ref);
            return Ok(None);
        }

        match tokio::fs::metadata(&install_directory).await {
            Ok(meta) if meta.is_dir() => Ok(Some(BotPathInfo {
                install_directory,
                environment,
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ContainerError::io(install_directory, e)),
        }
    }

    fn command(&self, info: &BotPathInfo) -> LaunchCommand {
        let dir = &info.install_directory;
        match info.environment {
            BotEnvironment::Native => LaunchCommand {
                command: dir.join(NATIVE_MAIN_FILE).to_string_lossy().into_owned(),
                ..Default::default()
            },
            BotEnvironment::Interpreted => LaunchCommand {
                command: self.interpreter.clone(),
                arguments: vec![dir.join(INTERPRETED_MAIN_FILE).to_string_lossy().into_owned()],
                ..Default::default()
            },
            BotEnvironment::Browser => LaunchCommand {
                command: self.browser_runner.clone().unwrap_or_default(),
                arguments: vec![dir.join(BROWSER_MAIN_FILE).to_string_lossy().into_owned()],
                ..Default::default()
            },
        }
    }

    async fn purge(&self) -> Result<(), ContainerError> {
        let mut entries = match tokio::fs::read_dir(&self.bots_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(ContainerError::io(&self.bots_root, e)),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ContainerError::io(&self.bots_root, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| ContainerError::io(&path, e))?;
            let result = if file_type.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            result.map_err(|e| ContainerError::io(&path, e))?;
            removed += 1;
        }

        info!("Purged {} entries from {:?}", removed, self.bots_root);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn resolve(
        resolver: &LocalSourceResolver,
        install_ref: &str,
        environment: BotEnvironment,
    ) -> Option<BotPathInfo> {
        resolver
            .resolve(&BotId::new(), install_ref, environment, &SpawnOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolves_installed_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("echo-bot")).unwrap();
        let resolver = LocalSourceResolver::new(root.path());

        let info = resolve(&resolver, "echo-bot", BotEnvironment::Interpreted)
            .await
            .unwrap();
        assert_eq!(info.install_directory, root.path().join("echo-bot"));
        assert!(resolve(&resolver, "missing", BotEnvironment::Native).await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_escaping_references() {
        let root = tempfile::tempdir().unwrap();
        let resolver = LocalSourceResolver::new(root.path().join("bots"));
        std::fs::create_dir(root.path().join("bots")).unwrap();

        assert!(resolve(&resolver, "../bots", BotEnvironment::Native).await.is_none());
        assert!(resolve(&resolver, "/etc", BotEnvironment::Native).await.is_none());
        assert!(resolve(&resolver, "", BotEnvironment::Native).await.is_none());
    }

    #[tokio::test]
    async fn test_browser_requires_runner() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("page-bot")).unwrap();

        let resolver = LocalSourceResolver::new(root.path());
        assert!(resolve(&resolver, "page-bot", BotEnvironment::Browser).await.is_none());

        let resolver = resolver.with_browser_runner("/usr/bin/runner");
        let info = resolve(&resolver, "page-bot", BotEnvironment::Browser)
            .await
            .unwrap();
        let command = resolver.command(&info);
        assert_eq!(command.command, "/usr/bin/runner");
        assert_eq!(
            command.arguments,
            vec![root.path().join("page-bot/index.html").to_string_lossy().into_owned()]
        );
    }

    #[test]
    fn test_commands_per_environment() {
        let resolver = LocalSourceResolver::new("/srv/bots").with_interpreter("/usr/bin/node");
        let native = resolver.command(&BotPathInfo {
            install_directory: PathBuf::from("/srv/bots/echo"),
            environment: BotEnvironment::Native,
        });
        assert_eq!(native.command, "/srv/bots/echo/main");
        assert!(native.arguments.is_empty());

        let interpreted = resolver.command(&BotPathInfo {
            install_directory: PathBuf::from("/srv/bots/echo"),
            environment: BotEnvironment::Interpreted,
        });
        assert_eq!(interpreted.command, "/usr/bin/node");
        assert_eq!(interpreted.arguments, vec!["/srv/bots/echo/main.js".to_string()]);
    }

    #[tokio::test]
    async fn test_purge_removes_everything_under_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("a/.bots/b-1")).unwrap();
        std::fs::write(root.path().join("stray.txt"), b"x").unwrap();
        let resolver = LocalSourceResolver::new(root.path());

        resolver.purge().await.unwrap();

        assert!(root.path().exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_purge_missing_root_is_ok() {
        let root = tempfile::tempdir().unwrap();
        let resolver = LocalSourceResolver::new(root.path().join("never-created"));
        resolver.purge().await.unwrap();
    }
}
