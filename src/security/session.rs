// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ephemeral wallet sessions.
//!
//! A session is created after a successful credential check and lives for a
//! fixed window (30 minutes by default). Use refreshes `last_used_at` but
//! never moves `expires_at`. Expired sessions are deleted on the first
//! validation after expiry and by the periodic sweeper.
//!
//! The raw token is returned to the caller exactly once. Only its SHA-256
//! digest is persisted, and neither value is ever logged.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::clock::Clock;
use super::error::{WalletError, WalletResult};
use crate::storage::StorageResult;

/// Token entropy in bytes (256 bits).
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Opaque session credential. `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token; hand it to the client and nowhere else.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Lookup key under which the session is stored.
    pub fn digest(&self) -> String {
        alloy::hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Persisted session state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub account_id: String,
    /// SHA-256 of the raw token, hex encoded.
    pub token_digest: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A freshly created session together with its raw token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: SessionToken,
    pub session: Session,
}

/// Persistence for sessions, keyed by token digest.
pub trait SessionRepository: Send + Sync {
    fn insert(&self, session: &Session) -> StorageResult<()>;

    fn get(&self, token_digest: &str) -> StorageResult<Option<Session>>;

    /// Update `last_used_at` of an existing session. Returns `false` when the
    /// session no longer exists; a missing session is never recreated.
    fn touch(&self, token_digest: &str, at: DateTime<Utc>) -> StorageResult<bool>;

    /// Returns whether a session was removed.
    fn delete(&self, token_digest: &str) -> StorageResult<bool>;

    fn delete_for_account(&self, account_id: &str) -> StorageResult<usize>;

    fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<usize>;
}

/// Issues, validates and revokes session tokens.
pub struct SessionStore {
    repo: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    rng: SystemRandom,
}

impl SessionStore {
    pub fn new(repo: Arc<dyn SessionRepository>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            repo,
            clock,
            ttl,
            rng: SystemRandom::new(),
        }
    }

    pub fn create(
        &self,
        account_id: &str,
        client_ip: Option<String>,
        user_agent: Option<String>,
    ) -> WalletResult<IssuedSession> {
        let token = self.generate_token()?;
        let now = self.clock.now();
        let session = Session {
            session_id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            token_digest: token.digest(),
            created_at: now,
            expires_at: now + self.ttl,
            last_used_at: now,
            client_ip,
            user_agent,
        };
        self.repo.insert(&session)?;

        tracing::info!(
            account_id = %account_id,
            session_id = %session.session_id,
            expires_at = %session.expires_at,
            "Wallet session created"
        );

        Ok(IssuedSession { token, session })
    }

    /// Resolve a token to a live session.
    pub fn validate(&self, token: &SessionToken) -> WalletResult<Session> {
        self.validate_matching(token, |_| true)
    }

    /// Resolve a token to a live session owned by `account_id`.
    ///
    /// Another account's session is reported as missing and left untouched.
    pub fn validate_owned(&self, token: &SessionToken, account_id: &str) -> WalletResult<Session> {
        self.validate_matching(token, |session| session.account_id == account_id)
    }

    fn validate_matching(
        &self,
        token: &SessionToken,
        owned: impl Fn(&Session) -> bool,
    ) -> WalletResult<Session> {
        let digest = token.digest();
        let mut session = self
            .repo
            .get(&digest)?
            .filter(|session| owned(session))
            .ok_or(WalletError::SessionNotFound)?;

        let now = self.clock.now();
        if session.is_expired(now) {
            self.repo.delete(&digest)?;
            tracing::debug!(session_id = %session.session_id, "Expired session removed on access");
            return Err(WalletError::SessionExpired);
        }

        if !self.repo.touch(&digest, now)? {
            return Err(WalletError::SessionNotFound);
        }
        session.last_used_at = now;
        Ok(session)
    }

    /// Revoke a single session, returning it.
    pub fn revoke(&self, token: &SessionToken) -> WalletResult<Session> {
        self.revoke_matching(token, |_| true)
    }

    /// Revoke a session only if it belongs to `account_id`.
    ///
    /// Another account's session is indistinguishable from a missing one.
    pub fn revoke_owned(&self, token: &SessionToken, account_id: &str) -> WalletResult<Session> {
        self.revoke_matching(token, |session| session.account_id == account_id)
    }

    fn revoke_matching(
        &self,
        token: &SessionToken,
        owned: impl Fn(&Session) -> bool,
    ) -> WalletResult<Session> {
        let digest = token.digest();
        let session = self
            .repo
            .get(&digest)?
            .filter(|session| owned(session))
            .ok_or(WalletError::SessionNotFound)?;
        if !self.repo.delete(&digest)? {
            return Err(WalletError::SessionNotFound);
        }
        tracing::info!(
            account_id = %session.account_id,
            session_id = %session.session_id,
            "Wallet session revoked"
        );
        Ok(session)
    }

    /// Revoke every session of an account. Returns the number removed.
    pub fn revoke_all(&self, account_id: &str) -> WalletResult<usize> {
        let removed = self.repo.delete_for_account(account_id)?;
        tracing::info!(account_id = %account_id, removed, "All wallet sessions revoked");
        Ok(removed)
    }

    pub fn purge_expired(&self) -> WalletResult<usize> {
        Ok(self.repo.delete_expired(self.clock.now())?)
    }

    fn generate_token(&self) -> WalletResult<SessionToken> {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| WalletError::Internal("system randomness unavailable".to_string()))?;
        Ok(SessionToken(alloy::hex::encode(bytes)))
    }
}
