// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer
//!
//! Pure value types shared by every transport implementation. No I/O.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`key`] | `PublicKey`, `Topic`, `PeerId`, `KeyError` |
//! | [`peer`] | `PeerEvent`, `SwarmError` |

pub mod key;
pub mod peer;

pub use key::*;
pub use peer::*;
