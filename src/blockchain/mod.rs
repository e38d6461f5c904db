// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM signing and broadcasting.
//!
//! This module provides functionality for:
//! - Turning decrypted key material into a local signer
//! - EIP-191 message, EIP-1559 transaction, EIP-712 and raw hash signing
//! - Broadcasting signed transactions over JSON-RPC

pub mod broadcast;
pub mod error;
pub mod signing;
pub mod types;

pub use broadcast::{Broadcaster, RpcBroadcaster};
pub use error::ChainError;
pub use types::*;
