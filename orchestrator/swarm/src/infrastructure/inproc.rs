// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// In-Process Swarm - frame delivery between transports sharing one process
//
// Every transport created from the same InprocNetwork sees the same topic
// table. Requests are delivered by calling the target peer's handler directly,
// so there is no serialization beyond the frame bytes themselves.
//
// Used by the embedded CLI mode and by tests. A networked transport implements
// the same SwarmTransport trait.

use crate::application::{RequestHandler, SwarmTransport};
use crate::domain::{PeerEvent, PeerId, SwarmError, Topic};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

const PEER_EVENT_CAPACITY: usize = 256;

struct Member {
    handler: Arc<dyn RequestHandler>,
    events: broadcast::Sender<PeerEvent>,
}

#[derive(Default)]
struct NetworkState {
    topics: HashMap<Topic, HashMap<PeerId, Member>>,
}

/// Shared topic table for in-process transports.
#[derive(Clone, Default)]
pub struct InprocNetwork {
    state: Arc<RwLock<NetworkState>>,
}

impl InprocNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport endpoint with the given identity.
    pub fn transport(&self, peer: PeerId) -> InprocTransport {
        let (events, _) = broadcast::channel(PEER_EVENT_CAPACITY);
        InprocTransport {
            network: self.clone(),
            peer,
            events,
        }
    }

    /// Peers currently joined to `topic`.
    pub fn members(&self, topic: &Topic) -> Vec<PeerId> {
        self.state
            .read()
            .topics
            .get(topic)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }
}

/// One endpoint on an [`InprocNetwork`].
#[derive(Clone)]
pub struct InprocTransport {
    network: InprocNetwork,
    peer: PeerId,
    events: broadcast::Sender<PeerEvent>,
}

impl InprocTransport {
    /// Look up the handler serving `peer` on `topic`, checking that this
    /// endpoint has joined the topic itself.
    fn route(&self, topic: &Topic, peer: &PeerId) -> Result<Arc<dyn RequestHandler>, SwarmError> {
        let state = self.network.state.read();
        let members = state
            .topics
            .get(topic)
            .filter(|members| members.contains_key(&self.peer))
            .ok_or(SwarmError::NotJoined(*topic))?;
        members
            .get(peer)
            .map(|member| member.handler.clone())
            .ok_or(SwarmError::PeerUnreachable(*peer))
    }
}

#[async_trait]
impl SwarmTransport for InprocTransport {
    fn local_peer(&self) -> PeerId {
        self.peer
    }

    async fn join(&self, topic: Topic, handler: Arc<dyn RequestHandler>) -> Result<(), SwarmError> {
        let mut state = self.network.state.write();
        let members = state.topics.entry(topic).or_default();

        for (existing, member) in members.iter() {
            if *existing == self.peer {
                continue;
            }
            let _ = member.events.send(PeerEvent::PeerJoined {
                topic,
                peer: self.peer,
            });
            let _ = self.events.send(PeerEvent::PeerJoined {
                topic,
                peer: *existing,
            });
        }

        members.insert(
            self.peer,
            Member {
                handler,
                events: self.events.clone(),
            },
        );
        debug!(peer = %self.peer, topic = %topic, "Joined topic");
        Ok(())
    }

    async fn leave(&self, topic: Topic) -> Result<(), SwarmError> {
        let mut state = self.network.state.write();
        let Some(members) = state.topics.get_mut(&topic) else {
            return Ok(());
        };
        if members.remove(&self.peer).is_none() {
            return Ok(());
        }

        for member in members.values() {
            let _ = member.events.send(PeerEvent::PeerLeft {
                topic,
                peer: self.peer,
            });
        }
        if members.is_empty() {
            state.topics.remove(&topic);
        }
        debug!(peer = %self.peer, topic = %topic, "Left topic");
        Ok(())
    }

    fn peer_events(&self) -> broadcast::Receiver<PeerEvent> {
        self.events.subscribe()
    }

    async fn request(&self, topic: Topic, peer: PeerId, frame: Bytes) -> Result<Bytes, SwarmError> {
        let handler = self.route(&topic, &peer)?;
        trace!(from = %self.peer, to = %peer, bytes = frame.len(), "Request frame");
        handler
            .handle(self.peer, frame)
            .await
            .ok_or(SwarmError::NoResponse(peer))
    }

    async fn send(&self, topic: Topic, peer: PeerId, frame: Bytes) -> Result<(), SwarmError> {
        let handler = self.route(&topic, &peer)?;
        let from = self.peer;
        trace!(from = %from, to = %peer, bytes = frame.len(), "Send frame");
        tokio::spawn(async move {
            let _ = handler.handle(from, frame).await;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::NullHandler;
    use crate::domain::PublicKey;
    use tokio::sync::Mutex;

    struct EchoHandler {
        seen: Arc<Mutex<Vec<(PeerId, Bytes)>>>,
    }

    #[async_trait]
    impl RequestHandler for EchoHandler {
        async fn handle(&self, from: PeerId, frame: Bytes) -> Option<Bytes> {
            self.seen.lock().await.push((from, frame.clone()));
            Some(frame)
        }
    }

    fn echo() -> (Arc<EchoHandler>, Arc<Mutex<Vec<(PeerId, Bytes)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (Arc::new(EchoHandler { seen: seen.clone() }), seen)
    }

    #[tokio::test]
    async fn test_join_announces_both_directions() {
        let network = InprocNetwork::new();
        let topic = PublicKey::random();
        let server = network.transport(topic);
        let client = network.transport(PublicKey::random());

        let mut server_events = server.peer_events();
        server.join(topic, Arc::new(NullHandler)).await.unwrap();

        let mut client_events = client.peer_events();
        client.join(topic, Arc::new(NullHandler)).await.unwrap();

        assert_eq!(
            client_events.recv().await.unwrap(),
            PeerEvent::PeerJoined { topic, peer: topic }
        );
        assert_eq!(
            server_events.recv().await.unwrap(),
            PeerEvent::PeerJoined {
                topic,
                peer: client.local_peer()
            }
        );
        assert_eq!(network.members(&topic).len(), 2);
    }

    #[tokio::test]
    async fn test_request_reaches_handler() {
        let network = InprocNetwork::new();
        let topic = PublicKey::random();
        let server = network.transport(topic);
        let client = network.transport(PublicKey::random());
        let (handler, seen) = echo();

        server.join(topic, handler).await.unwrap();
        client.join(topic, Arc::new(NullHandler)).await.unwrap();

        let reply = client
            .request(topic, topic, Bytes::from_static(b"ping"))
            .await
            .unwrap();
        assert_eq!(reply, Bytes::from_static(b"ping"));

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, client.local_peer());
    }

    #[tokio::test]
    async fn test_request_requires_join() {
        let network = InprocNetwork::new();
        let topic = PublicKey::random();
        let client = network.transport(PublicKey::random());

        let err = client
            .request(topic, topic, Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err, SwarmError::NotJoined(topic));
    }

    #[tokio::test]
    async fn test_unknown_peer_is_unreachable() {
        let network = InprocNetwork::new();
        let topic = PublicKey::random();
        let client = network.transport(PublicKey::random());
        client.join(topic, Arc::new(NullHandler)).await.unwrap();

        let other = PublicKey::random();
        let err = client.request(topic, other, Bytes::new()).await.unwrap_err();
        assert_eq!(err, SwarmError::PeerUnreachable(other));
    }

    #[tokio::test]
    async fn test_silent_handler_yields_no_response() {
        let network = InprocNetwork::new();
        let topic = PublicKey::random();
        let server = network.transport(topic);
        let client = network.transport(PublicKey::random());
        server.join(topic, Arc::new(NullHandler)).await.unwrap();
        client.join(topic, Arc::new(NullHandler)).await.unwrap();

        let err = client.request(topic, topic, Bytes::new()).await.unwrap_err();
        assert_eq!(err, SwarmError::NoResponse(topic));
    }

    #[tokio::test]
    async fn test_send_is_delivered_without_reply() {
        let network = InprocNetwork::new();
        let topic = PublicKey::random();
        let server = network.transport(topic);
        let client = network.transport(PublicKey::random());
        let (handler, seen) = echo();
        server.join(topic, handler).await.unwrap();
        client.join(topic, Arc::new(NullHandler)).await.unwrap();

        client
            .send(topic, topic, Bytes::from_static(b"stop"))
            .await
            .unwrap();

        for _ in 0..50 {
            if !seen.lock().await.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(seen.lock().await[0].1, Bytes::from_static(b"stop"));
    }

    #[tokio::test]
    async fn test_leave_notifies_remaining_members() {
        let network = InprocNetwork::new();
        let topic = PublicKey::random();
        let server = network.transport(topic);
        let client = network.transport(PublicKey::random());
        server.join(topic, Arc::new(NullHandler)).await.unwrap();
        let mut server_events = server.peer_events();
        client.join(topic, Arc::new(NullHandler)).await.unwrap();
        client.leave(topic).await.unwrap();

        assert!(matches!(
            server_events.recv().await.unwrap(),
            PeerEvent::PeerJoined { .. }
        ));
        assert_eq!(
            server_events.recv().await.unwrap(),
            PeerEvent::PeerLeft {
                topic,
                peer: client.local_peer()
            }
        );
        // Leaving twice is harmless.
        client.leave(topic).await.unwrap();
        assert_eq!(network.members(&topic), vec![topic]);
    }
}
