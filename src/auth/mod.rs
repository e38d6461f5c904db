// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Wallet endpoints take two separate credentials:
//!
//! 1. `Authorization: Bearer <jwt>` identifies the account. The token is an
//!    HS256 JWT whose `sub` is the account ID.
//! 2. `X-Wallet-Session: <token>` proves a recent wallet password check. It
//!    is issued by `POST /v1/wallet/sessions` and expires after 30 minutes.
//!
//! A session token presented under a different account's bearer is treated
//! as if it did not exist.
//!
//! ## Security
//!
//! - All non-health endpoints require the bearer token
//! - Clock skew tolerance is 60 seconds
//! - Neither credential is ever logged

pub mod claims;
pub mod error;
pub mod extractor;

pub use claims::{AuthenticatedAccount, IdentityClaims, IdentityVerifier};
pub use error::AuthError;
pub use extractor::{Identity, WalletSession};

/// Header carrying the wallet session token.
pub const WALLET_SESSION_HEADER: &str = "x-wallet-session";
