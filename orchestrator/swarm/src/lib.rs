// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `botfactory-swarm` — Swarm Transport Seam
//!
//! The bot factory never talks to the network directly. Everything it needs
//! from the peer-to-peer layer goes through the traits in [`application`]:
//! joining and leaving a rendezvous topic, observing peers that join, and
//! exchanging opaque frames with a peer either as request/response or as
//! fire-and-forget.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `PublicKey` (`Topic`, `PeerId`), `PeerEvent`, `SwarmError` |
//! | [`application`] | Application | `SwarmTransport`, `RequestHandler` traits |
//! | [`infrastructure`] | Infrastructure | `InprocNetwork` in-memory swarm |
//!
//! ## Key Concepts
//!
//! - **Topic**: a 32 byte key naming a rendezvous channel. A factory's peer
//!   identity is its topic (self-addressed rendezvous).
//! - **Frame**: an opaque `Bytes` payload. Encoding is owned by the protocol
//!   layer in `botfactory-core`.
//!
//! Encryption and discovery belong to the real network implementation and are
//! not part of this crate. [`infrastructure::InprocNetwork`] delivers frames
//! between transports living in the same process.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{NullHandler, RequestHandler, SwarmTransport};
pub use domain::*;
pub use infrastructure::inproc::{InprocNetwork, InprocTransport};
