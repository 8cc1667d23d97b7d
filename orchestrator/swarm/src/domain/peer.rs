// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::key::{PeerId, Topic};
use thiserror::Error;

/// Membership change observed on a joined topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    PeerJoined { topic: Topic, peer: PeerId },
    PeerLeft { topic: Topic, peer: PeerId },
}

impl PeerEvent {
    pub fn peer(&self) -> &PeerId {
        match self {
            PeerEvent::PeerJoined { peer, .. } | PeerEvent::PeerLeft { peer, .. } => peer,
        }
    }

    pub fn topic(&self) -> &Topic {
        match self {
            PeerEvent::PeerJoined { topic, .. } | PeerEvent::PeerLeft { topic, .. } => topic,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwarmError {
    #[error("Not joined to topic {0}")]
    NotJoined(Topic),
    #[error("Peer {0} is not reachable on this topic")]
    PeerUnreachable(PeerId),
    #[error("Peer {0} returned no response")]
    NoResponse(PeerId),
    #[error("Transport disconnected: {0}")]
    Disconnected(String),
}
