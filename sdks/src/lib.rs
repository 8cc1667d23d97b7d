// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bot Factory Rust SDK
//!
//! Command a running factory over the swarm: spawn and manage bots, pass
//! invitations, probe status and ask the factory to stop.

pub mod client;
pub mod types;

pub use client::FactoryClient;
pub use types::*;
