// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the botfactory CLI

pub mod bot;
pub mod config;
pub mod topic;

pub use self::bot::BotCommand;
pub use self::config::ConfigCommand;
pub use self::topic::TopicCommand;
