// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Factory Protocol - typed commands exchanged between clients and a factory
//
// Every frame is a JSON object carrying a `__type_url` tag of the form
// `botfactory.protocol.<Name>`. Callers check the tag of a response before
// reading any of its fields.

use crate::domain::bot::{BotEnvironment, BotId, BotView};
use botfactory_swarm::PublicKey;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Options accompanying a spawn request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnOptions {
    /// Source reference to install from. Defaults to the bot name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_ref: Option<String>,
    #[serde(default)]
    pub environment: BotEnvironment,
    /// Display name for the spawned instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type_url")]
pub enum Request {
    #[serde(rename = "botfactory.protocol.Spawn")]
    Spawn {
        bot_name: String,
        #[serde(default)]
        options: SpawnOptions,
    },
    #[serde(rename = "botfactory.protocol.Status")]
    Status {},
    #[serde(rename = "botfactory.protocol.Invitation")]
    Invitation {
        bot_id: BotId,
        party_key: PublicKey,
        /// JSON text.
        spec: String,
        /// JSON text.
        invitation: String,
    },
    #[serde(rename = "botfactory.protocol.BotManagement")]
    BotManagement { bot_id: BotId, command: String },
    #[serde(rename = "botfactory.protocol.Reset")]
    Reset {
        #[serde(default)]
        wipe_source: bool,
    },
    #[serde(rename = "botfactory.protocol.Stop")]
    Stop {
        #[serde(default)]
        exit_code: i32,
    },
    #[serde(rename = "botfactory.protocol.GenericCommand")]
    GenericCommand {
        bot_id: BotId,
        #[serde(with = "base64_payload")]
        payload: Vec<u8>,
    },
}

impl Request {
    pub fn type_name(&self) -> &'static str {
        match self {
            Request::Spawn { .. } => "Spawn",
            Request::Status {} => "Status",
            Request::Invitation { .. } => "Invitation",
            Request::BotManagement { .. } => "BotManagement",
            Request::Reset { .. } => "Reset",
            Request::Stop { .. } => "Stop",
            Request::GenericCommand { .. } => "GenericCommand",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type_url")]
pub enum Response {
    #[serde(rename = "botfactory.protocol.SpawnResponse")]
    SpawnResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bot_id: Option<BotId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "botfactory.protocol.CommandResponse")]
    CommandResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "botfactory.protocol.StatusResponse")]
    StatusResponse(StatusResponse),
    #[serde(rename = "botfactory.protocol.BotCommandResponse")]
    BotCommandResponse {
        bot_id: BotId,
        #[serde(default, with = "base64_payload")]
        payload: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Response {
    pub fn type_name(&self) -> &'static str {
        match self {
            Response::SpawnResponse { .. } => "SpawnResponse",
            Response::CommandResponse { .. } => "CommandResponse",
            Response::StatusResponse(_) => "StatusResponse",
            Response::BotCommandResponse { .. } => "BotCommandResponse",
        }
    }

    pub fn ok() -> Self {
        Response::CommandResponse { error: None }
    }

    pub fn failed(error: impl ToString) -> Self {
        Response::CommandResponse {
            error: Some(error.to_string()),
        }
    }
}

/// Factory status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    /// Seconds since the factory started.
    pub uptime: u64,
    #[serde(default)]
    pub bots: Vec<BotView>,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Malformed frame: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn encode<T: Serialize>(message: &T) -> Result<Bytes, ProtocolError> {
    serde_json::to_vec(message)
        .map(Bytes::from)
        .map_err(ProtocolError::Encode)
}

pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(frame).map_err(ProtocolError::Decode)
}

mod base64_payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}
