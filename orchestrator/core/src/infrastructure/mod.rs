// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** OS processes, filesystem watching, on-disk sources and the
//!   in-memory event bus

pub mod event_bus;
pub mod fs_watch;
pub mod process;
pub mod source;
