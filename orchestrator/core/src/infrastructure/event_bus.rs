// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for bot lifecycle events
//
// In-memory only, built on tokio broadcast channels. Subscribers that fall
// behind lose the oldest events and are told how many they missed.

use crate::domain::bot::BotId;
use crate::domain::events::BotEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct BotEventBus {
    sender: Arc<broadcast::Sender<BotEvent>>,
}

impl BotEventBus {
    /// Create a new event bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: BotEvent) {
        debug!("Publishing bot event: {:?}", event);
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to bot event");
        }
    }

    pub fn subscribe(&self) -> BotEventReceiver {
        BotEventReceiver {
            receiver: self.sender.subscribe(),
            bot_id: None,
        }
    }

    /// Subscribe to events of a single bot
    pub fn subscribe_bot(&self, bot_id: BotId) -> BotEventReceiver {
        BotEventReceiver {
            receiver: self.sender.subscribe(),
            bot_id: Some(bot_id),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BotEventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

pub struct BotEventReceiver {
    receiver: broadcast::Receiver<BotEvent>,
    bot_id: Option<BotId>,
}

impl BotEventReceiver {
    /// Receive the next event, skipping events for other bots when filtered
    pub async fn recv(&mut self) -> Result<BotEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<BotEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(|e| match e {
                broadcast::error::TryRecvError::Empty => EventBusError::Empty,
                broadcast::error::TryRecvError::Closed => EventBusError::Closed,
                broadcast::error::TryRecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    fn matches(&self, event: &BotEvent) -> bool {
        self.bot_id
            .as_ref()
            .is_none_or(|bot_id| event.bot_id() == bot_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(id: &str, code: i32) -> BotEvent {
        BotEvent::Closed {
            bot_id: BotId::from(id),
            exit_code: Some(code),
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = BotEventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.publish(closed("b-1", 0));

        assert_eq!(receiver.recv().await.unwrap(), closed("b-1", 0));
    }

    #[tokio::test]
    async fn test_bot_filtering() {
        let bus = BotEventBus::new(10);
        let mut receiver = bus.subscribe_bot(BotId::from("b-2"));

        bus.publish(closed("b-1", 1));
        bus.publish(closed("b-2", 2));

        assert_eq!(receiver.recv().await.unwrap(), closed("b-2", 2));
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_told() {
        let bus = BotEventBus::new(2);
        let mut receiver = bus.subscribe();
        for code in 0..4 {
            bus.publish(closed("b-1", code));
        }
        assert!(matches!(receiver.recv().await, Err(EventBusError::Lagged(2))));
        assert_eq!(bus.subscriber_count(), 1);
    }
}
