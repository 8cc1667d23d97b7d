// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `botfactory-core`
//!
//! Runs bots as supervised child processes and serves the factory protocol
//! that lets remote clients spawn and manage them.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | bot ids and views, protocol messages, config, resolver and probe traits |
//! | [`application`] | Application | `BotContainer`, `BotFactory` |
//! | [`infrastructure`] | Infrastructure | processes, filesystem probe, local resolver, event bus |
//!
//! ## Wiring
//!
//! A factory is a [`BotContainer`](application::BotContainer) wrapped in a
//! [`BotFactory`](application::BotFactory), joined to its control topic on a
//! [`botfactory_swarm::SwarmTransport`] whose peer id equals that topic.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::bot::{BotEnvironment, BotId, BotView, ContainerError, LaunchInfo};
pub use domain::events::BotEvent;
pub use domain::protocol::{Request, Response, SpawnOptions, StatusResponse};
