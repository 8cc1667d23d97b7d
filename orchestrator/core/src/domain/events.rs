// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::bot::BotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle notifications published by the bot container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotEvent {
    Spawned {
        bot_id: BotId,
        pid: Option<u32>,
        restarted: bool,
        spawned_at: DateTime<Utc>,
    },
    Stopped {
        bot_id: BotId,
        stopped_at: DateTime<Utc>,
    },
    /// The bot process exited, whether on its own or because it was stopped.
    /// `exit_code` is `None` when the process was terminated by a signal.
    Closed {
        bot_id: BotId,
        exit_code: Option<i32>,
    },
}

impl BotEvent {
    pub fn bot_id(&self) -> &BotId {
        match self {
            BotEvent::Spawned { bot_id, .. }
            | BotEvent::Stopped { bot_id, .. }
            | BotEvent::Closed { bot_id, .. } => bot_id,
        }
    }
}
