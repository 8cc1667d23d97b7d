// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Types
//!
//! Client configuration, connection state, status and errors.

use botfactory_core::domain::node_config::ClientSettings;
use botfactory_core::domain::protocol::{ProtocolError, StatusResponse};
use botfactory_swarm::SwarmError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bound on waiting for the factory to appear on its topic.
    pub connect_timeout: Duration,
    /// Bound on each request/response exchange. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl From<&ClientSettings> for ClientConfig {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout(),
            request_timeout: settings.request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Result of a status probe. `details` is present only when the factory
/// answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryStatus {
    pub started: bool,
    #[serde(flatten)]
    pub details: Option<StatusResponse>,
}

impl FactoryStatus {
    pub fn unavailable() -> Self {
        Self {
            started: false,
            details: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Timed out after {0:?} waiting for the factory to join the topic")]
    ConnectionTimeout(Duration),
    #[error("Invalid response: expected {expected}, got {actual}")]
    InvalidResponse { expected: &'static str, actual: String },
    #[error("{0}")]
    Application(String),
    #[error("No response within {0:?}")]
    RequestTimeout(Duration),
    #[error("Transport error: {0}")]
    Transport(#[from] SwarmError),
    #[error(transparent)]
    Codec(#[from] ProtocolError),
}

/// Connection failure shared between every caller of one attempt.
#[derive(Debug, Clone)]
pub(crate) enum ConnectError {
    Timeout(Duration),
    Transport(SwarmError),
}

impl From<ConnectError> for ClientError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Timeout(limit) => ClientError::ConnectionTimeout(limit),
            ConnectError::Transport(e) => ClientError::Transport(e),
        }
    }
}
