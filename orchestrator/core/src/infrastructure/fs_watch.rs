// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Filesystem activity probe.
//!
//! Any change below a bot's working directory counts as activity.

use crate::domain::bot::ContainerError;
use crate::domain::health::{ActivityClock, ActivityProbe, ActivityWatch};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct FsActivityProbe;

impl FsActivityProbe {
    pub fn new() -> Self {
        Self
    }
}

impl ActivityProbe for FsActivityProbe {
    fn watch(
        &self,
        working_directory: &Path,
        clock: ActivityClock,
    ) -> Result<ActivityWatch, ContainerError> {
        let watch_error = |e: notify::Error| ContainerError::Watch {
            path: working_directory.to_path_buf(),
            reason: e.to_string(),
        };

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    trace!("Activity: {:?} {:?}", event.kind, event.paths);
                    clock.touch();
                }
                Err(e) => warn!("Watch error: {}", e),
            },
            Config::default(),
        )
        .map_err(watch_error)?;

        watcher
            .watch(working_directory, RecursiveMode::Recursive)
            .map_err(watch_error)?;

        debug!("Watching directory: {:?}", working_directory);
        Ok(ActivityWatch::new(watcher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_file_change_updates_clock() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ActivityClock::new();
        let before = clock.last_active();

        let watch = FsActivityProbe::new()
            .watch(dir.path(), clock.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("state.json"), b"{}").unwrap();

        let mut moved = false;
        for _ in 0..100 {
            if clock.last_active() > before {
                moved = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(moved, "clock never advanced");
        watch.close();
    }

    #[test]
    fn test_missing_directory_is_a_watch_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let err = FsActivityProbe::new()
            .watch(&missing, ActivityClock::new())
            .unwrap_err();
        assert!(matches!(err, ContainerError::Watch { .. }));
    }
}
