// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password verification, failure tracking and lockout.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use zeroize::Zeroizing;

use super::account::{load_account, FailureOutcome, IdentityStore};
use super::audit::{AuditAction, AuditLogger};
use super::clock::Clock;
use super::error::{WalletError, WalletResult};
use super::locks::AccountLocks;
use super::session::{IssuedSession, SessionStore};
use crate::config::SecurityPolicy;

/// Hash a password with Argon2id, returning the PHC string.
pub fn hash_password(password: &str) -> WalletResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WalletError::Internal(format!("Failed to hash password: {e}")))
}

/// Check a password against a PHC-formatted hash.
pub fn verify_password(password: &str, hash: &str) -> WalletResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| WalletError::Internal(format!("Invalid password hash format: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Client metadata recorded on sessions and audit entries.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Authenticates account passwords and opens wallet sessions.
pub struct CredentialVerifier {
    identity: Arc<dyn IdentityStore>,
    locks: Arc<AccountLocks>,
    sessions: Arc<SessionStore>,
    audit: AuditLogger,
    clock: Arc<dyn Clock>,
    policy: SecurityPolicy,
}

impl CredentialVerifier {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        locks: Arc<AccountLocks>,
        sessions: Arc<SessionStore>,
        audit: AuditLogger,
        clock: Arc<dyn Clock>,
        policy: SecurityPolicy,
    ) -> Self {
        Self {
            identity,
            locks,
            sessions,
            audit,
            clock,
            policy,
        }
    }

    /// Verify `password` for `account_id` and open a session on success.
    ///
    /// Unknown accounts are reported as [`WalletError::InvalidCredentials`].
    pub async fn verify_credentials(
        &self,
        account_id: &str,
        password: &str,
        client: ClientInfo,
    ) -> WalletResult<IssuedSession> {
        let guard = self.locks.acquire(account_id).await;

        let mut account = match load_account(self.identity.as_ref(), account_id) {
            Ok(account) => account,
            Err(WalletError::AccountNotFound(_)) => {
                tracing::warn!(account_id = %account_id, "Credential check for unknown account");
                return Err(WalletError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        let now = self.clock.now();
        if let Some(until) = account.security().active_lock(now) {
            let err = WalletError::AccountLocked { until };
            self.record_failure(account_id, AuditAction::AccountLocked, &err, &client);
            return Err(err);
        }
        if account.security().lock_lapsed(now) {
            account.security_mut().unlock();
        }

        let security = account.security().clone();
        let candidate = Zeroizing::new(password.to_string());
        let matches = tokio::task::spawn_blocking(move || security.verify_password(&candidate))
            .await
            .map_err(|e| WalletError::Internal(format!("Password check aborted: {e}")))??;

        if !matches {
            let outcome = account.security_mut().record_failure(
                now,
                self.policy.max_failed_attempts,
                self.policy.lockout_duration,
            );
            self.identity.update_account(&account)?;
            drop(guard);

            let (err, action) = match outcome {
                FailureOutcome::Locked { until } => {
                    tracing::warn!(account_id = %account_id, %until, "Account locked after repeated failures");
                    (WalletError::AccountLocked { until }, AuditAction::AccountLocked)
                }
                FailureOutcome::Rejected { failed_attempts } => {
                    tracing::warn!(account_id = %account_id, failed_attempts, "Invalid wallet password");
                    (WalletError::InvalidCredentials, AuditAction::CredentialRejected)
                }
            };
            self.record_failure(account_id, action, &err, &client);
            return Err(err);
        }

        account.security_mut().reset_failures();
        account.security_mut().mark_wallet_access(now);
        self.identity.update_account(&account)?;
        drop(guard);

        let issued = self.sessions.create(
            account_id,
            client.client_ip.clone(),
            client.user_agent.clone(),
        )?;

        self.audit.append(
            self.audit
                .entry(account_id, AuditAction::SessionCreated)
                .with_client(client.client_ip, client.user_agent),
        );

        Ok(issued)
    }

    fn record_failure(
        &self,
        account_id: &str,
        action: AuditAction,
        err: &WalletError,
        client: &ClientInfo,
    ) {
        self.audit.append(
            self.audit
                .entry(account_id, action)
                .with_client(client.client_ip.clone(), client.user_agent.clone())
                .failed(err),
        );
    }
}
