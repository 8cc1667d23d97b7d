// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Liveness
//!
//! Bots have no heartbeat. The container infers activity from whatever an
//! [`ActivityProbe`] reports and records it on an [`ActivityClock`].

use crate::domain::bot::ContainerError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// Last time a bot showed signs of life.
#[derive(Debug, Clone)]
pub struct ActivityClock(Arc<Mutex<DateTime<Utc>>>);

impl ActivityClock {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Utc::now())))
    }

    pub fn touch(&self) {
        *self.0.lock() = Utc::now();
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Live observation started by an [`ActivityProbe`]. Observation ends when
/// the watch is closed or dropped.
pub struct ActivityWatch {
    guard: Mutex<Option<Box<dyn Send>>>,
}

impl ActivityWatch {
    pub fn new<G: Send + 'static>(guard: G) -> Self {
        Self {
            guard: Mutex::new(Some(Box::new(guard))),
        }
    }

    pub fn close(self) {
        drop(self.guard.lock().take());
    }

    pub fn is_open(&self) -> bool {
        self.guard.lock().is_some()
    }
}

impl std::fmt::Debug for ActivityWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityWatch")
            .field("open", &self.is_open())
            .finish()
    }
}

pub trait ActivityProbe: Send + Sync {
    /// Start observing `working_directory`, touching `clock` on activity.
    fn watch(
        &self,
        working_directory: &Path,
        clock: ActivityClock,
    ) -> Result<ActivityWatch, ContainerError>;
}
