// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Transport traits
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** The seam between the bot factory and whatever peer-to-peer
//!   network carries its frames.

use crate::domain::{PeerEvent, PeerId, SwarmError, Topic};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Serves frames addressed to the local peer on a joined topic.
///
/// Returning `None` means the request produces no reply (fire-and-forget
/// commands, or frames the handler chose to drop).
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, from: PeerId, frame: Bytes) -> Option<Bytes>;
}

/// Handler for peers that only issue requests and never serve any.
pub struct NullHandler;

#[async_trait]
impl RequestHandler for NullHandler {
    async fn handle(&self, _from: PeerId, _frame: Bytes) -> Option<Bytes> {
        None
    }
}

#[async_trait]
pub trait SwarmTransport: Send + Sync {
    /// Identity of this endpoint on the swarm.
    fn local_peer(&self) -> PeerId;

    /// Join a topic, serving inbound frames with `handler`.
    async fn join(&self, topic: Topic, handler: Arc<dyn RequestHandler>) -> Result<(), SwarmError>;

    /// Leave a topic. Leaving a topic that was never joined is not an error.
    async fn leave(&self, topic: Topic) -> Result<(), SwarmError>;

    /// Subscribe to membership changes on every topic this endpoint joined.
    ///
    /// Subscribe before joining to observe peers that are already present.
    fn peer_events(&self) -> broadcast::Receiver<PeerEvent>;

    /// Send a frame and wait for the correlated reply.
    async fn request(&self, topic: Topic, peer: PeerId, frame: Bytes) -> Result<Bytes, SwarmError>;

    /// Send a frame without waiting for any reply.
    async fn send(&self, topic: Topic, peer: PeerId, frame: Bytes) -> Result<(), SwarmError>;
}
