// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bot Container
//!
//! Supervises bot processes: provisions working directories, injects the
//! control environment, watches for activity, restarts in place and tears
//! down whole process trees.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Owns the registry of bot instances and every process-level
//!   operation on them
//!
//! Each live process is paired with an activity watch. The pair is acquired
//! together in [`BotContainer::spawn`] and released together on stop, kill
//! and on the process's own exit. Every process start gets a run number so a
//! late exit notification from a replaced process never releases the handles
//! of its successor.

use crate::domain::bot::{BotEnvironment, BotId, BotView, ContainerError, LaunchInfo};
use crate::domain::events::BotEvent;
use crate::domain::health::{ActivityClock, ActivityProbe, ActivityWatch};
use crate::domain::protocol::SpawnOptions;
use crate::domain::source::SourceResolver;
use crate::infrastructure::event_bus::{BotEventBus, BotEventReceiver};
use crate::infrastructure::process::{self, ProcessHandle};
use botfactory_swarm::{PublicKey, Topic};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::Child;
use tracing::{debug, info, warn};

pub const ENV_CONTROL_TOPIC: &str = "BOTFACTORY_BOT_CONTROL_TOPIC";
pub const ENV_BOT_UID: &str = "BOTFACTORY_BOT_UID";
pub const ENV_BOT_NAME: &str = "BOTFACTORY_BOT_NAME";
pub const ENV_BOT_CWD: &str = "BOTFACTORY_BOT_CWD";
pub const ENV_BOT_RESTARTED: &str = "BOTFACTORY_BOT_RESTARTED";
pub const ENV_NODE_PATH: &str = "NODE_PATH";

type Registry = Arc<RwLock<HashMap<BotId, BotInstance>>>;

struct BotInstance {
    bot_id: BotId,
    launch: LaunchInfo,
    parties: Vec<PublicKey>,
    started: DateTime<Utc>,
    clock: ActivityClock,
    stopped: bool,
    run: u64,
    process: Option<ProcessHandle>,
    activity: Option<ActivityWatch>,
}

impl BotInstance {
    fn view(&self) -> BotView {
        BotView {
            bot_id: self.bot_id.clone(),
            install_ref: self.launch.install_ref.clone(),
            name: self.launch.name.clone(),
            environment: self.launch.environment,
            working_directory: self.launch.working_directory.clone(),
            command: self.launch.command.clone(),
            arguments: self.launch.arguments.clone(),
            parties: self.parties.clone(),
            started: self.started,
            last_active: self.clock.last_active(),
            stopped: self.stopped,
            pid: self.process.as_ref().and_then(ProcessHandle::pid),
        }
    }

    fn release(&mut self) -> Released {
        Released {
            process: self.process.take(),
            activity: self.activity.take(),
        }
    }
}

/// Handles taken out of the registry, to be disposed of outside the lock.
struct Released {
    process: Option<ProcessHandle>,
    activity: Option<ActivityWatch>,
}

impl Released {
    fn is_empty(&self) -> bool {
        self.process.is_none() && self.activity.is_none()
    }

    fn terminate(self) {
        if let Some(process) = self.process {
            process.kill_tree();
        }
        if let Some(activity) = self.activity {
            activity.close();
        }
    }
}

fn live_count(bots: &HashMap<BotId, BotInstance>) -> usize {
    bots.values().filter(|bot| bot.process.is_some()).count()
}

pub struct BotContainer {
    control_topic: Topic,
    resolver: Arc<dyn SourceResolver>,
    probe: Arc<dyn ActivityProbe>,
    node_path: Option<String>,
    events: BotEventBus,
    bots: Registry,
    runs: AtomicU64,
}

impl BotContainer {
    pub fn new(
        control_topic: Topic,
        resolver: Arc<dyn SourceResolver>,
        probe: Arc<dyn ActivityProbe>,
    ) -> Self {
        Self {
            control_topic,
            resolver,
            probe,
            node_path: None,
            events: BotEventBus::with_default_capacity(),
            bots: Arc::new(RwLock::new(HashMap::new())),
            runs: AtomicU64::new(0),
        }
    }

    /// Module resolution path for non-native bots.
    pub fn with_node_path(mut self, node_path: Option<String>) -> Self {
        self.node_path = node_path;
        self
    }

    pub fn with_event_bus(mut self, events: BotEventBus) -> Self {
        self.events = events;
        self
    }

    pub fn control_topic(&self) -> Topic {
        self.control_topic
    }

    /// Resolve a bot's sources and prepare its working directory.
    ///
    /// Fails with [`ContainerError::UnresolvedBot`] before touching the
    /// filesystem when the resolver does not know `install_ref`.
    pub async fn resolve_launch(
        &self,
        name: Option<&str>,
        bot_id: &BotId,
        install_ref: &str,
        environment: BotEnvironment,
        options: &SpawnOptions,
    ) -> Result<LaunchInfo, ContainerError> {
        let info = self
            .resolver
            .resolve(bot_id, install_ref, environment, options)
            .await?
            .ok_or_else(|| ContainerError::UnresolvedBot(name.unwrap_or(install_ref).to_string()))?;

        let working_directory = LaunchInfo::working_directory_for(&info.install_directory, bot_id);
        tokio::fs::create_dir_all(&working_directory)
            .await
            .map_err(|e| ContainerError::io(&working_directory, e))?;

        let command = self.resolver.command(&info);
        let mut env = command.env;
        env.extend(options.env.clone());

        Ok(LaunchInfo {
            install_ref: install_ref.to_string(),
            name: name.map(str::to_string),
            environment: info.environment,
            install_directory: info.install_directory,
            working_directory,
            command: command.command,
            arguments: command.arguments,
            env,
        })
    }

    /// Start a bot process.
    ///
    /// When `bot_id` is already registered this is a restart: any live process
    /// is terminated and the process, watch and `last_active` are replaced
    /// while the id, parties and `started` are kept.
    pub async fn spawn(&self, bot_id: BotId, launch: LaunchInfo) -> Result<BotView, ContainerError> {
        let previous = {
            let mut bots = self.bots.write();
            bots.get_mut(&bot_id).map(|instance| {
                instance.stopped = true;
                instance.release()
            })
        };
        let restarted = previous.is_some();
        if let Some(previous) = previous {
            previous.terminate();
        }

        let env = self.child_env(&bot_id, &launch, restarted);
        let clock = ActivityClock::new();
        let started = self
            .probe
            .watch(&launch.working_directory, clock.clone())
            .and_then(|activity| {
                let (handle, child) = process::spawn_bot(&launch, &env)?;
                Ok((activity, handle, child))
            });
        let (activity, handle, mut child) = match started {
            Ok(parts) => parts,
            Err(e) => {
                // A bot that never ran leaves nothing behind.
                if !restarted {
                    discard_working_directory(&launch.working_directory).await;
                }
                return Err(e);
            }
        };
        process::forward_output(&bot_id, &mut child);

        let pid = handle.pid();
        let watched = handle.clone();
        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        let (view, displaced, live) = {
            let mut bots = self.bots.write();
            let instance = bots.entry(bot_id.clone()).or_insert_with(|| BotInstance {
                bot_id: bot_id.clone(),
                launch: launch.clone(),
                parties: Vec::new(),
                started: Utc::now(),
                clock: clock.clone(),
                stopped: false,
                run,
                process: None,
                activity: None,
            });
            // A concurrent spawn may have slipped in between release and here.
            let displaced = instance.release();
            instance.launch = launch;
            instance.clock = clock;
            instance.stopped = false;
            instance.run = run;
            instance.process = Some(handle);
            instance.activity = Some(activity);
            (instance.view(), displaced, live_count(&bots))
        };
        displaced.terminate();

        tokio::spawn(monitor_exit(
            self.bots.clone(),
            self.events.clone(),
            bot_id.clone(),
            run,
            watched,
            child,
        ));

        info!(
            bot_id = %bot_id,
            pid = ?pid,
            command = %view.command,
            args = ?view.arguments,
            cwd = ?view.working_directory,
            restarted,
            "Spawned bot"
        );
        metrics::counter!("botfactory_bots_spawned_total").increment(1);
        metrics::gauge!("botfactory_bots_live").set(live as f64);
        self.events.publish(BotEvent::Spawned {
            bot_id,
            pid,
            restarted,
            spawned_at: Utc::now(),
        });

        Ok(view)
    }

    /// Start a stopped bot again with its stored launch info. A running bot
    /// is left alone.
    pub async fn start(&self, bot_id: &BotId) -> Result<BotView, ContainerError> {
        let launch = {
            let bots = self.bots.read();
            let instance = bots
                .get(bot_id)
                .ok_or_else(|| ContainerError::UnknownBot(bot_id.clone()))?;
            if instance.process.is_some() {
                return Ok(instance.view());
            }
            instance.launch.clone()
        };
        self.relaunch(bot_id, launch).await
    }

    /// Stop, then spawn again with the stored launch info.
    pub async fn restart(&self, bot_id: &BotId) -> Result<BotView, ContainerError> {
        let launch = self.launch_info(bot_id)?;
        self.stop(bot_id)?;
        self.relaunch(bot_id, launch).await
    }

    async fn relaunch(&self, bot_id: &BotId, launch: LaunchInfo) -> Result<BotView, ContainerError> {
        tokio::fs::create_dir_all(&launch.working_directory)
            .await
            .map_err(|e| ContainerError::io(&launch.working_directory, e))?;
        self.spawn(bot_id.clone(), launch).await
    }

    /// Kill the bot's process tree and close its activity watch. Stopping a
    /// stopped bot does nothing.
    pub fn stop(&self, bot_id: &BotId) -> Result<(), ContainerError> {
        let (released, live) = {
            let mut bots = self.bots.write();
            let instance = bots
                .get_mut(bot_id)
                .ok_or_else(|| ContainerError::UnknownBot(bot_id.clone()))?;
            instance.stopped = true;
            let released = instance.release();
            (released, live_count(&bots))
        };

        if released.is_empty() {
            debug!(bot_id = %bot_id, "Bot already stopped");
            return Ok(());
        }

        let pid = released.process.as_ref().and_then(ProcessHandle::pid);
        released.terminate();
        info!(bot_id = %bot_id, pid = ?pid, "Stopped bot");
        metrics::counter!("botfactory_bots_stopped_total").increment(1);
        metrics::gauge!("botfactory_bots_live").set(live as f64);
        self.events.publish(BotEvent::Stopped {
            bot_id: bot_id.clone(),
            stopped_at: Utc::now(),
        });
        Ok(())
    }

    /// Stop the bot, delete its working directory and forget it.
    pub async fn kill(&self, bot_id: &BotId) -> Result<(), ContainerError> {
        self.stop(bot_id)?;
        let removed = self.bots.write().remove(bot_id);
        let Some(instance) = removed else {
            return Ok(());
        };

        let dir = &instance.launch.working_directory;
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ContainerError::io(dir, e)),
        }
        info!(bot_id = %bot_id, "Killed bot and removed {:?}", dir);
        Ok(())
    }

    /// Remove all installed bot sources.
    pub async fn purge_source(&self) -> Result<(), ContainerError> {
        self.resolver.purge().await
    }

    pub fn describe(&self, bot_id: &BotId) -> Result<BotView, ContainerError> {
        self.bots
            .read()
            .get(bot_id)
            .map(BotInstance::view)
            .ok_or_else(|| ContainerError::UnknownBot(bot_id.clone()))
    }

    /// All bots, oldest first.
    pub fn list(&self) -> Vec<BotView> {
        let mut views: Vec<BotView> = self.bots.read().values().map(BotInstance::view).collect();
        views.sort_by(|a, b| a.started.cmp(&b.started).then_with(|| a.bot_id.cmp(&b.bot_id)));
        views
    }

    pub fn bot_ids(&self) -> Vec<BotId> {
        self.bots.read().keys().cloned().collect()
    }

    pub fn subscribe(&self) -> BotEventReceiver {
        self.events.subscribe()
    }

    pub fn subscribe_bot(&self, bot_id: BotId) -> BotEventReceiver {
        self.events.subscribe_bot(bot_id)
    }

    /// Record that a bot joined a party.
    pub fn add_party(&self, bot_id: &BotId, party: PublicKey) -> Result<(), ContainerError> {
        let mut bots = self.bots.write();
        let instance = bots
            .get_mut(bot_id)
            .ok_or_else(|| ContainerError::UnknownBot(bot_id.clone()))?;
        if !instance.parties.contains(&party) {
            instance.parties.push(party);
        }
        Ok(())
    }

    /// Stop every bot. Returns how many were registered.
    pub fn shutdown(&self) -> usize {
        let ids = self.bot_ids();
        for bot_id in &ids {
            if let Err(e) = self.stop(bot_id) {
                debug!(bot_id = %bot_id, "Skipping stop during shutdown: {}", e);
            }
        }
        ids.len()
    }

    fn launch_info(&self, bot_id: &BotId) -> Result<LaunchInfo, ContainerError> {
        self.bots
            .read()
            .get(bot_id)
            .map(|instance| instance.launch.clone())
            .ok_or_else(|| ContainerError::UnknownBot(bot_id.clone()))
    }

    fn child_env(&self, bot_id: &BotId, launch: &LaunchInfo, restarted: bool) -> BTreeMap<String, String> {
        let mut env = launch.env.clone();

        if launch.environment != BotEnvironment::Native {
            env.insert("NODE_OPTIONS".to_string(), String::new());
            if let Some(node_path) = &self.node_path {
                env.insert(ENV_NODE_PATH.to_string(), node_path.clone());
            }
        }

        let name = launch.name.as_deref().unwrap_or(&launch.install_ref);
        env.insert(ENV_CONTROL_TOPIC.to_string(), self.control_topic.to_hex());
        env.insert(ENV_BOT_UID.to_string(), bot_id.to_string());
        env.insert(ENV_BOT_NAME.to_string(), name.to_string());
        env.insert(
            ENV_BOT_CWD.to_string(),
            launch.working_directory.to_string_lossy().into_owned(),
        );
        env.insert(ENV_BOT_RESTARTED.to_string(), restarted.to_string());
        env
    }
}

impl Drop for BotContainer {
    fn drop(&mut self) {
        let released: Vec<Released> = self.bots.write().values_mut().map(BotInstance::release).collect();
        for handles in released {
            handles.terminate();
        }
    }
}

/// Wait for a bot process to exit, release its handles if they still belong
/// to this run, and announce the exit. Never restarts.
async fn discard_working_directory(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed unused working directory {:?}", dir),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove unused working directory {:?}: {}", dir, e),
    }
}

async fn monitor_exit(
    bots: Registry,
    events: BotEventBus,
    bot_id: BotId,
    run: u64,
    handle: ProcessHandle,
    mut child: Child,
) {
    let pid = handle.pid();
    let exit_code = match process::wait_exit(&handle, &mut child).await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(bot_id = %bot_id, "Failed to wait for bot process: {}", e);
            None
        }
    };

    let (released, live) = {
        let mut bots = bots.write();
        let released = bots
            .get_mut(&bot_id)
            .filter(|instance| instance.run == run)
            .map(|instance| {
                instance.stopped = true;
                instance.release()
            });
        (released, live_count(&bots))
    };
    if let Some(Released { activity: Some(activity), .. }) = released {
        activity.close();
    }

    info!(bot_id = %bot_id, pid = ?pid, exit_code = ?exit_code, "Bot exited");
    metrics::counter!("botfactory_bots_closed_total").increment(1);
    metrics::gauge!("botfactory_bots_live").set(live as f64);
    events.publish(BotEvent::Closed { bot_id, exit_code });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::source::{BotPathInfo, LaunchCommand};
    use crate::infrastructure::event_bus::EventBusError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    /// Resolves `<root>/<ref>` and runs `sh -c <script>`.
    struct ScriptResolver {
        root: PathBuf,
        script: String,
    }

    #[async_trait]
    impl SourceResolver for ScriptResolver {
        async fn resolve(
            &self,
            _bot_id: &BotId,
            install_ref: &str,
            environment: BotEnvironment,
            _options: &SpawnOptions,
        ) -> Result<Option<BotPathInfo>, ContainerError> {
            let dir = self.root.join(install_ref);
            Ok(dir.is_dir().then_some(BotPathInfo {
                install_directory: dir,
                environment,
            }))
        }

        fn command(&self, _info: &BotPathInfo) -> LaunchCommand {
            LaunchCommand {
                command: "sh".to_string(),
                arguments: vec!["-c".to_string(), self.script.clone()],
                env: BTreeMap::new(),
            }
        }

        async fn purge(&self) -> Result<(), ContainerError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingProbe {
        watched: Mutex<Vec<PathBuf>>,
    }

    impl ActivityProbe for CountingProbe {
        fn watch(&self, dir: &Path, _clock: ActivityClock) -> Result<ActivityWatch, ContainerError> {
            self.watched.lock().push(dir.to_path_buf());
            Ok(ActivityWatch::new(()))
        }
    }

    fn container(root: &Path, script: &str) -> (BotContainer, Arc<CountingProbe>) {
        std::fs::create_dir_all(root.join("echo-bot")).unwrap();
        let probe = Arc::new(CountingProbe::default());
        let resolver = Arc::new(ScriptResolver {
            root: root.to_path_buf(),
            script: script.to_string(),
        });
        (
            BotContainer::new(PublicKey::new([9; 32]), resolver, probe.clone()),
            probe,
        )
    }

    async fn launch(container: &BotContainer, bot_id: &BotId) -> LaunchInfo {
        container
            .resolve_launch(
                Some("echo"),
                bot_id,
                "echo-bot",
                BotEnvironment::Native,
                &SpawnOptions::default(),
            )
            .await
            .unwrap()
    }

    async fn next_closed(events: &mut BotEventReceiver) -> Option<i32> {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
                .await
                .expect("no close event")
                .unwrap();
            if let BotEvent::Closed { exit_code, .. } = event {
                return exit_code;
            }
        }
    }

    #[tokio::test]
    async fn test_spawn_creates_working_directory() {
        let root = tempfile::tempdir().unwrap();
        let (container, probe) = container(root.path(), "sleep 30");
        let bot_id = BotId::new();

        let info = launch(&container, &bot_id).await;
        assert_eq!(info.working_directory, root.path().join("echo-bot/.bots").join(bot_id.as_str()));
        assert!(info.working_directory.is_dir());

        let view = container.spawn(bot_id.clone(), info).await.unwrap();
        assert!(!view.stopped);
        assert!(view.pid.is_some());
        assert_eq!(probe.watched.lock().len(), 1);

        container.stop(&bot_id).unwrap();
    }

    #[tokio::test]
    async fn test_unresolved_bot_has_no_side_effects() {
        let root = tempfile::tempdir().unwrap();
        let (container, probe) = container(root.path(), "true");
        let bot_id = BotId::new();

        let err = container
            .resolve_launch(None, &bot_id, "ghost", BotEnvironment::Native, &SpawnOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ContainerError::UnresolvedBot(ref name) if name == "ghost"));
        assert!(!root.path().join("ghost").exists());
        assert!(probe.watched.lock().is_empty());
        assert!(container.list().is_empty());
    }

    #[tokio::test]
    async fn test_exec_failure_removes_working_directory() {
        let root = tempfile::tempdir().unwrap();
        let (container, _) = container(root.path(), "true");
        let bot_id = BotId::new();

        let mut info = launch(&container, &bot_id).await;
        let cwd = info.working_directory.clone();
        assert!(cwd.is_dir());
        info.command = "/definitely/not/here".to_string();

        let err = container.spawn(bot_id.clone(), info).await.unwrap_err();
        assert!(matches!(err, ContainerError::SpawnFailed { .. }));
        assert!(!cwd.exists());
        assert!(matches!(container.describe(&bot_id), Err(ContainerError::UnknownBot(_))));
        // The install directory itself is untouched.
        assert!(root.path().join("echo-bot").is_dir());
    }

    #[tokio::test]
    async fn test_injected_environment() {
        let root = tempfile::tempdir().unwrap();
        let script = r#"printf '%s\n' "$BOTFACTORY_BOT_UID" "$BOTFACTORY_BOT_NAME" "$BOTFACTORY_BOT_RESTARTED" "$BOTFACTORY_BOT_CONTROL_TOPIC" "$(pwd)" > env.txt"#;
        let (container, _) = container(root.path(), script);
        let bot_id = BotId::from("b-env");
        let mut events = container.subscribe_bot(bot_id.clone());

        let info = launch(&container, &bot_id).await;
        let cwd = info.working_directory.clone();
        container.spawn(bot_id.clone(), info).await.unwrap();
        assert_eq!(next_closed(&mut events).await, Some(0));

        let written = std::fs::read_to_string(cwd.join("env.txt")).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "b-env");
        assert_eq!(lines[1], "echo");
        assert_eq!(lines[2], "false");
        assert_eq!(lines[3], "09".repeat(32));
        assert_eq!(
            std::fs::canonicalize(lines[4]).unwrap(),
            std::fs::canonicalize(&cwd).unwrap()
        );
    }

    #[tokio::test]
    async fn test_exit_publishes_close_and_releases_handles() {
        let root = tempfile::tempdir().unwrap();
        let (container, _) = container(root.path(), "exit 3");
        let bot_id = BotId::new();
        let mut events = container.subscribe_bot(bot_id.clone());

        let info = launch(&container, &bot_id).await;
        container.spawn(bot_id.clone(), info).await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), BotEvent::Spawned { restarted: false, .. }));
        assert_eq!(next_closed(&mut events).await, Some(3));

        let view = container.describe(&bot_id).unwrap();
        assert!(view.stopped);
        assert!(view.pid.is_none());
        // No automatic restart.
        assert!(matches!(events.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let (container, _) = container(root.path(), "sleep 30");
        let bot_id = BotId::new();
        let mut events = container.subscribe_bot(bot_id.clone());

        let info = launch(&container, &bot_id).await;
        container.spawn(bot_id.clone(), info).await.unwrap();

        container.stop(&bot_id).unwrap();
        container.stop(&bot_id).unwrap();

        let mut stopped = 0;
        assert!(matches!(events.recv().await.unwrap(), BotEvent::Spawned { .. }));
        assert!(matches!(events.recv().await.unwrap(), BotEvent::Stopped { .. }));
        stopped += 1;
        assert_eq!(next_closed(&mut events).await, None);
        while let Ok(event) = events.try_recv() {
            if matches!(event, BotEvent::Stopped { .. }) {
                stopped += 1;
            }
        }
        assert_eq!(stopped, 1);
        assert!(container.describe(&bot_id).unwrap().stopped);
    }

    #[tokio::test]
    async fn test_stop_unknown_bot() {
        let root = tempfile::tempdir().unwrap();
        let (container, _) = container(root.path(), "true");
        let err = container.stop(&BotId::from("nope")).unwrap_err();
        assert!(matches!(err, ContainerError::UnknownBot(_)));
    }

    #[tokio::test]
    async fn test_restart_preserves_identity_and_parties() {
        let root = tempfile::tempdir().unwrap();
        let (container, probe) = container(root.path(), "sleep 30");
        let bot_id = BotId::new();
        let party = PublicKey::new([4; 32]);

        let info = launch(&container, &bot_id).await;
        let first = container.spawn(bot_id.clone(), info).await.unwrap();
        container.add_party(&bot_id, party).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = container.restart(&bot_id).await.unwrap();

        assert_eq!(second.bot_id, first.bot_id);
        assert_eq!(second.parties, vec![party]);
        assert_eq!(second.started, first.started);
        assert!(second.last_active > first.last_active);
        assert_ne!(second.pid, first.pid);
        assert!(!second.stopped);
        assert_eq!(probe.watched.lock().len(), 2);

        container.stop(&bot_id).unwrap();
    }

    #[tokio::test]
    async fn test_restarted_flag_reaches_child() {
        let root = tempfile::tempdir().unwrap();
        let (container, _) = container(root.path(), r#"echo "$BOTFACTORY_BOT_RESTARTED" >> flags.txt"#);
        let bot_id = BotId::new();
        let mut events = container.subscribe_bot(bot_id.clone());

        let info = launch(&container, &bot_id).await;
        let cwd = info.working_directory.clone();
        container.spawn(bot_id.clone(), info).await.unwrap();
        next_closed(&mut events).await;
        container.start(&bot_id).await.unwrap();
        next_closed(&mut events).await;

        let flags = std::fs::read_to_string(cwd.join("flags.txt")).unwrap();
        assert_eq!(flags, "false\ntrue\n");
    }

    #[tokio::test]
    async fn test_kill_removes_directory_and_entry() {
        let root = tempfile::tempdir().unwrap();
        let (container, _) = container(root.path(), "sleep 30");
        let bot_id = BotId::new();

        let info = launch(&container, &bot_id).await;
        let cwd = info.working_directory.clone();
        container.spawn(bot_id.clone(), info).await.unwrap();
        std::fs::write(cwd.join("state.db"), b"data").unwrap();

        container.kill(&bot_id).await.unwrap();
        assert!(!cwd.exists());
        assert!(matches!(container.describe(&bot_id), Err(ContainerError::UnknownBot(_))));

        let again = launch(&container, &bot_id).await;
        assert_eq!(again.working_directory, cwd);
        assert!(cwd.is_dir());
        assert_eq!(std::fs::read_dir(&cwd).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let root = tempfile::tempdir().unwrap();
        let (container, _) = container(root.path(), "sleep 30");

        for _ in 0..3 {
            let bot_id = BotId::new();
            let info = launch(&container, &bot_id).await;
            container.spawn(bot_id, info).await.unwrap();
        }

        assert_eq!(container.shutdown(), 3);
        assert!(container.list().iter().all(|bot| bot.stopped && bot.pid.is_none()));
    }

    #[tokio::test]
    async fn test_non_native_environment_gets_node_path() {
        let root = tempfile::tempdir().unwrap();
        let (container, _) = container(root.path(), "true");
        let container = container.with_node_path(Some("/opt/modules".to_string()));
        let bot_id = BotId::new();

        let mut info = launch(&container, &bot_id).await;
        let env = container.child_env(&bot_id, &info, false);
        assert!(!env.contains_key(ENV_NODE_PATH));

        info.environment = BotEnvironment::Interpreted;
        let env = container.child_env(&bot_id, &info, true);
        assert_eq!(env.get(ENV_NODE_PATH).map(String::as_str), Some("/opt/modules"));
        assert_eq!(env.get(ENV_BOT_RESTARTED).map(String::as_str), Some("true"));
    }
}
