// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Bot identities, launch descriptions, protocol messages and the traits the
//! container needs from the outside world (source resolution, liveness).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types shared by the container, the factory handler and the
//!   client SDK

pub mod bot;
pub mod events;
pub mod health;
pub mod node_config;
pub mod protocol;
pub mod source;
