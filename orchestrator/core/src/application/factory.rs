// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bot Factory
//!
//! Serves the factory protocol on a swarm topic and drives a [`BotContainer`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Decode commands, perform the container operation, reply
//!   with a typed response

use crate::application::container::BotContainer;
use crate::domain::bot::BotId;
use crate::domain::protocol::{self, Request, Response, SpawnOptions, StatusResponse};
use async_trait::async_trait;
use botfactory_swarm::{PeerId, PublicKey, RequestHandler};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Delivers messages to running bots. Bots talk to the factory over their
/// control topic, which is outside this crate.
#[async_trait]
pub trait BotRelay: Send + Sync {
    async fn invite(
        &self,
        bot_id: &BotId,
        party_key: &PublicKey,
        spec: &str,
        invitation: &str,
    ) -> Result<(), String>;

    async fn command(&self, bot_id: &BotId, payload: &[u8]) -> Result<Vec<u8>, String>;
}

pub struct BotFactory {
    container: Arc<BotContainer>,
    relay: Option<Arc<dyn BotRelay>>,
    version: String,
    started: Instant,
    shutdown: watch::Sender<Option<i32>>,
}

impl BotFactory {
    pub fn new(container: Arc<BotContainer>) -> Self {
        let (shutdown, _) = watch::channel(None);
        Self {
            container,
            relay: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started: Instant::now(),
            shutdown,
        }
    }

    pub fn with_relay(mut self, relay: Arc<dyn BotRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn container(&self) -> &Arc<BotContainer> {
        &self.container
    }

    /// Resolves to the requested exit code once a Stop command arrives.
    pub fn shutdown_signal(&self) -> watch::Receiver<Option<i32>> {
        self.shutdown.subscribe()
    }

    /// Perform one request. `None` means no reply is sent.
    pub async fn dispatch(&self, request: Request) -> Option<Response> {
        metrics::counter!("botfactory_requests_total", "type" => request.type_name()).increment(1);
        debug!("Handling {} request", request.type_name());

        match request {
            Request::Spawn { bot_name, options } => Some(self.spawn(bot_name, options).await),
            Request::Status {} => Some(self.status()),
            Request::BotManagement { bot_id, command } => {
                Some(command_response(self.manage(&bot_id, &command).await))
            }
            Request::Invitation {
                bot_id,
                party_key,
                spec,
                invitation,
            } => Some(command_response(
                self.invite(&bot_id, party_key, &spec, &invitation).await,
            )),
            Request::Reset { wipe_source } => Some(command_response(self.reset(wipe_source).await)),
            Request::Stop { exit_code } => {
                let stopped = self.container.shutdown();
                info!(exit_code, bots = stopped, "Stop requested");
                self.shutdown.send_replace(Some(exit_code));
                None
            }
            Request::GenericCommand { bot_id, payload } => Some(self.relay_command(bot_id, payload).await),
        }
    }

    async fn spawn(&self, bot_name: String, options: SpawnOptions) -> Response {
        let bot_id = BotId::new();
        let install_ref = options.install_ref.clone().unwrap_or_else(|| bot_name.clone());
        let name = options.name.clone().unwrap_or(bot_name);

        let result = async {
            let launch = self
                .container
                .resolve_launch(Some(&name), &bot_id, &install_ref, options.environment, &options)
                .await?;
            self.container.spawn(bot_id.clone(), launch).await
        }
        .await;

        match result {
            Ok(view) => Response::SpawnResponse {
                bot_id: Some(view.bot_id),
                error: None,
            },
            Err(e) => {
                warn!(bot_id = %bot_id, "Spawn of '{}' failed: {}", install_ref, e);
                Response::SpawnResponse {
                    bot_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn status(&self) -> Response {
        Response::StatusResponse(StatusResponse {
            version: self.version.clone(),
            uptime: self.started.elapsed().as_secs(),
            bots: self.container.list(),
        })
    }

    async fn manage(&self, bot_id: &BotId, command: &str) -> Result<(), String> {
        let result = match command {
            "start" => self.container.start(bot_id).await.map(|_| ()),
            "stop" => self.container.stop(bot_id),
            "restart" => self.container.restart(bot_id).await.map(|_| ()),
            "kill" => self.container.kill(bot_id).await,
            other => return Err(format!("Unknown bot command: {}", other)),
        };
        result.map_err(|e| e.to_string())
    }

    async fn invite(
        &self,
        bot_id: &BotId,
        party_key: PublicKey,
        spec: &str,
        invitation: &str,
    ) -> Result<(), String> {
        self.container
            .add_party(bot_id, party_key)
            .map_err(|e| e.to_string())?;
        match &self.relay {
            Some(relay) => relay.invite(bot_id, &party_key, spec, invitation).await,
            None => {
                debug!(bot_id = %bot_id, "No relay configured; invitation recorded only");
                Ok(())
            }
        }
    }

    async fn reset(&self, wipe_source: bool) -> Result<(), String> {
        for bot_id in self.container.bot_ids() {
            self.container.kill(&bot_id).await.map_err(|e| e.to_string())?;
        }
        if wipe_source {
            self.container.purge_source().await.map_err(|e| e.to_string())?;
        }
        info!(wipe_source, "Factory reset");
        Ok(())
    }

    async fn relay_command(&self, bot_id: BotId, payload: Vec<u8>) -> Response {
        let result = match &self.relay {
            Some(relay) => relay.command(&bot_id, &payload).await,
            None => Err("No bot relay configured".to_string()),
        };
        match result {
            Ok(payload) => Response::BotCommandResponse {
                bot_id,
                payload,
                error: None,
            },
            Err(error) => Response::BotCommandResponse {
                bot_id,
                payload: Vec::new(),
                error: Some(error),
            },
        }
    }
}

fn command_response(result: Result<(), String>) -> Response {
    match result {
        Ok(()) => Response::ok(),
        Err(error) => Response::failed(error),
    }
}

#[async_trait]
impl RequestHandler for BotFactory {
    async fn handle(&self, from: PeerId, frame: Bytes) -> Option<Bytes> {
        let response = match protocol::decode::<Request>(&frame) {
            Ok(request) => self.dispatch(request).await?,
            Err(e) => {
                warn!(peer = %from, "Rejected frame: {}", e);
                Response::failed(e)
            }
        };

        match protocol::encode(&response) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(peer = %from, "Failed to encode {}: {}", response.type_name(), e);
                None
            }
        }
    }
}
