// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::types::{ClientConfig, ClientError, ConnectError, ConnectionState, FactoryStatus};
use botfactory_core::domain::bot::BotId;
use botfactory_core::domain::protocol::{self, ProtocolError, Request, Response, SpawnOptions};
use botfactory_swarm::{NullHandler, PeerEvent, PublicKey, SwarmError, SwarmTransport, Topic};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

type ConnectAttempt = Shared<BoxFuture<'static, Result<(), ConnectError>>>;

/// Client for one factory, addressed by its topic (which is also its peer id).
///
/// The connection is established lazily by the first call. Concurrent callers
/// share a single attempt; a failed attempt is forgotten so the next call
/// starts over.
pub struct FactoryClient {
    transport: Arc<dyn SwarmTransport>,
    topic: Topic,
    config: ClientConfig,
    connection: Mutex<Option<ConnectAttempt>>,
}

impl FactoryClient {
    pub fn new(transport: Arc<dyn SwarmTransport>, topic: Topic) -> Self {
        Self::with_config(transport, topic, ClientConfig::default())
    }

    pub fn with_config(transport: Arc<dyn SwarmTransport>, topic: Topic, config: ClientConfig) -> Self {
        Self {
            transport,
            topic,
            config,
            connection: Mutex::new(None),
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn state(&self) -> ConnectionState {
        match self.connection.lock().as_ref().map(|attempt| attempt.peek()) {
            None | Some(Some(Err(_))) => ConnectionState::Disconnected,
            Some(None) => ConnectionState::Connecting,
            Some(Some(Ok(()))) => ConnectionState::Connected,
        }
    }

    /// Spawn a bot. Returns the id the factory assigned.
    pub async fn spawn(&self, bot_name: &str, options: SpawnOptions) -> Result<BotId, ClientError> {
        let response = self
            .call(Request::Spawn {
                bot_name: bot_name.to_string(),
                options,
            })
            .await?;
        match response {
            Response::SpawnResponse {
                error: Some(error), ..
            } => Err(ClientError::Application(error)),
            Response::SpawnResponse {
                bot_id: Some(bot_id),
                error: None,
            } => Ok(bot_id),
            Response::SpawnResponse { bot_id: None, .. } => Err(ClientError::InvalidResponse {
                expected: "SpawnResponse",
                actual: "SpawnResponse without bot_id".to_string(),
            }),
            other => Err(ClientError::InvalidResponse {
                expected: "SpawnResponse",
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// Send a management command (`start`, `stop`, `restart`, `kill`) to a bot.
    pub async fn manage(&self, bot_id: &BotId, command: &str) -> Result<(), ClientError> {
        let response = self
            .call(Request::BotManagement {
                bot_id: bot_id.clone(),
                command: command.to_string(),
            })
            .await?;
        expect_command_response(response)
    }

    /// Invite a bot into a party. `spec` and `invitation` travel as JSON text.
    pub async fn invite<S, I>(
        &self,
        bot_id: &BotId,
        party_key: PublicKey,
        spec: &S,
        invitation: &I,
    ) -> Result<(), ClientError>
    where
        S: Serialize + ?Sized,
        I: Serialize + ?Sized,
    {
        let spec = serde_json::to_string(spec).map_err(ProtocolError::Encode)?;
        let invitation = serde_json::to_string(invitation).map_err(ProtocolError::Encode)?;
        let response = self
            .call(Request::Invitation {
                bot_id: bot_id.clone(),
                party_key,
                spec,
                invitation,
            })
            .await?;
        expect_command_response(response)
    }

    /// Kill every bot, optionally wiping installed sources too.
    pub async fn reset(&self, wipe_source: bool) -> Result<(), ClientError> {
        let response = self.call(Request::Reset { wipe_source }).await?;
        expect_command_response(response)
    }

    /// Ask the factory to stop. The factory may exit before it could answer,
    /// so no response is awaited.
    pub async fn stop(&self, exit_code: i32) -> Result<(), ClientError> {
        self.connect().await?;
        let frame = protocol::encode(&Request::Stop { exit_code })?;
        self.transport.send(self.topic, self.topic, frame).await?;
        info!(exit_code, "Sent stop to factory {}", self.topic);
        Ok(())
    }

    /// Probe the factory. Never fails: any error reports `started: false`.
    pub async fn status(&self) -> FactoryStatus {
        match self.call(Request::Status {}).await {
            Ok(Response::StatusResponse(details)) => FactoryStatus {
                started: true,
                details: Some(details),
            },
            Ok(other) => {
                debug!("Status probe got {}", other.type_name());
                FactoryStatus::unavailable()
            }
            Err(e) => {
                debug!("Status probe failed: {}", e);
                FactoryStatus::unavailable()
            }
        }
    }

    /// Pass an opaque payload through to a bot and return the raw answer.
    pub async fn send_command(&self, bot_id: &BotId, payload: Vec<u8>) -> Result<Response, ClientError> {
        self.call(Request::GenericCommand {
            bot_id: bot_id.clone(),
            payload,
        })
        .await
    }

    /// Leave the factory topic, whether or not a connection was ever
    /// established. In-flight calls are not cancelled.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connection.lock().take();
        self.transport.leave(self.topic).await?;
        debug!("Left factory topic {}", self.topic);
        Ok(())
    }

    async fn call(&self, request: Request) -> Result<Response, ClientError> {
        self.connect().await?;
        let expected = request.type_name();
        let frame = protocol::encode(&request)?;
        let exchange = self.transport.request(self.topic, self.topic, frame);
        let reply = match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| ClientError::RequestTimeout(limit))??,
            None => exchange.await?,
        };
        decode_response(expected, &reply)
    }

    async fn connect(&self) -> Result<(), ClientError> {
        let attempt = {
            let mut slot = self.connection.lock();
            match slot.as_ref() {
                Some(attempt) => attempt.clone(),
                None => {
                    let attempt = bootstrap(self.transport.clone(), self.topic, self.config.connect_timeout)
                        .boxed()
                        .shared();
                    *slot = Some(attempt.clone());
                    attempt
                }
            }
        };

        let result = attempt.clone().await;
        if result.is_err() {
            let mut slot = self.connection.lock();
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&attempt)) {
                *slot = None;
            }
        }
        result.map_err(ClientError::from)
    }
}

/// Join the topic and wait for the factory peer to show up.
async fn bootstrap(
    transport: Arc<dyn SwarmTransport>,
    topic: Topic,
    limit: Duration,
) -> Result<(), ConnectError> {
    // Subscribe first so a factory that is already present is not missed.
    let mut events = transport.peer_events();

    let joined = async {
        transport
            .join(topic, Arc::new(NullHandler))
            .await
            .map_err(ConnectError::Transport)?;
        loop {
            match events.recv().await {
                Ok(PeerEvent::PeerJoined { topic: t, peer }) if t == topic && peer == topic => {
                    return Ok(());
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!("Peer event stream lagged by {} events", n);
                }
                Err(RecvError::Closed) => {
                    return Err(ConnectError::Transport(SwarmError::Disconnected(
                        "peer event stream closed".to_string(),
                    )));
                }
            }
        }
    };

    match tokio::time::timeout(limit, joined).await {
        Ok(Ok(())) => {
            info!("Connected to factory {}", topic);
            Ok(())
        }
        Ok(Err(e)) => {
            leave_quietly(transport.as_ref(), topic).await;
            Err(e)
        }
        Err(_) => {
            warn!("Factory {} did not join within {:?}", topic, limit);
            leave_quietly(transport.as_ref(), topic).await;
            Err(ConnectError::Timeout(limit))
        }
    }
}

/// Undo the join of a failed attempt. The next call joins again.
async fn leave_quietly(transport: &dyn SwarmTransport, topic: Topic) {
    if let Err(e) = transport.leave(topic).await {
        debug!("Leaving {} after failed connect: {}", topic, e);
    }
}

fn expect_command_response(response: Response) -> Result<(), ClientError> {
    match response {
        Response::CommandResponse { error: None } => Ok(()),
        Response::CommandResponse { error: Some(error) } => Err(ClientError::Application(error)),
        other => Err(ClientError::InvalidResponse {
            expected: "CommandResponse",
            actual: other.type_name().to_string(),
        }),
    }
}

/// Decode a reply. A frame whose tag this client does not understand is an
/// invalid response; anything else that fails to parse is a codec error.
fn decode_response(request_type: &str, reply: &Bytes) -> Result<Response, ClientError> {
    match protocol::decode::<Response>(reply) {
        Ok(response) => Ok(response),
        Err(e) => {
            let tag = serde_json::from_slice::<serde_json::Value>(reply)
                .ok()
                .and_then(|value| value.get("__type_url")?.as_str().map(str::to_string));
            match tag {
                Some(actual) => Err(ClientError::InvalidResponse {
                    expected: "a response",
                    actual: format!("{} (for {})", actual, request_type),
                }),
                None => Err(ClientError::Codec(e)),
            }
        }
    }
}
