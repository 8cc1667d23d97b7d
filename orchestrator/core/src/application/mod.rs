// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Bot supervision and the factory command handler

pub mod container;
pub mod factory;

pub use container::BotContainer;
pub use factory::{BotFactory, BotRelay};
