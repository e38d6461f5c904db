// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Security Core
//!
//! Password-gated wallet sessions in front of custodial signing.
//!
//! - [`credentials`] checks passwords and locks accounts after repeated failures
//! - [`session`] issues and validates short-lived session tokens
//! - [`nonce`] enforces strictly sequential per-account transaction nonces
//! - [`rate_limit`] caps signing operations per account per window
//! - [`audit`] records every security-relevant outcome
//! - [`gateway`] ties them together for the five signing operations
//!
//! Per-account state is serialized through [`locks::AccountLocks`]; different
//! accounts never block one another.

pub mod account;
pub mod audit;
pub mod clock;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod locks;
pub mod nonce;
pub mod rate_limit;
pub mod session;
pub mod sweeper;

pub use account::{AccountRecord, AccountSecurity, IdentityStore};
pub use audit::{AuditAction, AuditEntry, AuditLogger, AuditOutcome, AuditSink};
pub use clock::{Clock, SystemClock};
pub use credentials::{hash_password, ClientInfo, CredentialVerifier};
pub use error::{WalletError, WalletResult};
pub use gateway::{GatewayBackends, RequestContext, SigningGateway, SweepReport};
pub use rate_limit::{CounterStore, RateLimiter};
pub use session::{IssuedSession, Session, SessionRepository, SessionStore, SessionToken};
pub use sweeper::ExpirySweeper;
