// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet Guard - Session-Gated Custodial Signing
//!
//! Password-unlocked wallet sessions in front of custodial EVM keys, with
//! strictly sequential per-account nonces, failed-attempt lockouts, a
//! fixed-window rate limit opened by the first request and an append-only
//! audit trail.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Identity bearer tokens and the wallet session header
//! - `blockchain` - EVM payload validation, signing and broadcast
//! - `custody` - Encrypted private key custody
//! - `security` - Credentials, sessions, nonces, rate limits, audit and the signing gateway
//! - `storage` - Embedded (redb) and in-memory persistence

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod custody;
pub mod error;
pub mod logging;
pub mod security;
pub mod state;
pub mod storage;
