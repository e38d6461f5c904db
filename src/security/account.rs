// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account security aggregate.
//!
//! The identity collaborator owns the wider user entity; this core only
//! touches the security subset (password hash, nonce, failure counter,
//! lockout, last wallet access) and the sealed key blob. All mutation goes
//! through the transitions on [`AccountSecurity`] so call sites cannot skip
//! an invariant such as resetting the failure counter on success.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::credentials;
use super::error::{WalletError, WalletResult};
use crate::storage::StorageResult;

/// Result of recording a failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Failure counted, account still usable.
    Rejected { failed_attempts: u32 },
    /// Threshold reached; account locked.
    Locked { until: DateTime<Utc> },
}

/// Security state of a single account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountSecurity {
    password_hash: String,
    nonce: u64,
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
    last_wallet_access: Option<DateTime<Utc>>,
}

impl AccountSecurity {
    /// Fresh security state: nonce 0, no failures, unlocked.
    pub fn new(password_hash: impl Into<String>) -> Self {
        Self {
            password_hash: password_hash.into(),
            nonce: 0,
            failed_attempts: 0,
            locked_until: None,
            last_wallet_access: None,
        }
    }

    /// Compare a candidate password against the stored Argon2 hash.
    pub fn verify_password(&self, password: &str) -> WalletResult<bool> {
        credentials::verify_password(password, &self.password_hash)
    }

    /// The lock expiry if a lock is currently in force.
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.locked_until.filter(|until| *until > now)
    }

    /// Whether a lock was set but has since lapsed.
    pub fn lock_lapsed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until <= now)
    }

    /// Count a failed verification, locking the account once `threshold`
    /// consecutive failures have been reached.
    pub fn record_failure(
        &mut self,
        now: DateTime<Utc>,
        threshold: u32,
        lockout: Duration,
    ) -> FailureOutcome {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if self.failed_attempts >= threshold {
            let until = now + lockout;
            self.lock(until);
            FailureOutcome::Locked { until }
        } else {
            FailureOutcome::Rejected {
                failed_attempts: self.failed_attempts,
            }
        }
    }

    /// Successful verification: the failure counter always returns to zero.
    pub fn reset_failures(&mut self) {
        self.failed_attempts = 0;
    }

    pub fn lock(&mut self, until: DateTime<Utc>) {
        self.locked_until = Some(until);
    }

    /// Clear the lock and start a fresh failure budget.
    pub fn unlock(&mut self) {
        self.locked_until = None;
        self.failed_attempts = 0;
    }

    pub fn mark_wallet_access(&mut self, now: DateTime<Utc>) {
        self.last_wallet_access = Some(now);
    }

    /// Consume `provided` if it equals the stored nonce.
    pub fn advance_nonce(&mut self, provided: u64) -> WalletResult<()> {
        if provided != self.nonce {
            return Err(WalletError::NonceMismatch {
                expected: self.nonce,
                got: provided,
            });
        }
        self.nonce = self
            .nonce
            .checked_add(1)
            .ok_or_else(|| WalletError::validation("nonce space exhausted"))?;
        Ok(())
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        self.locked_until
    }

    pub fn last_wallet_access(&self) -> Option<DateTime<Utc>> {
        self.last_wallet_access
    }
}

/// The slice of an identity record this core reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRecord {
    pub account_id: String,
    security: AccountSecurity,
    /// Private key sealed by the key-custody collaborator.
    encrypted_key: Vec<u8>,
}

impl AccountRecord {
    pub fn new(
        account_id: impl Into<String>,
        password_hash: impl Into<String>,
        encrypted_key: Vec<u8>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            security: AccountSecurity::new(password_hash),
            encrypted_key,
        }
    }

    pub fn security(&self) -> &AccountSecurity {
        &self.security
    }

    pub fn security_mut(&mut self) -> &mut AccountSecurity {
        &mut self.security
    }

    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }
}

/// Identity collaborator: persistence of account security records.
pub trait IdentityStore: Send + Sync {
    fn get_account(&self, account_id: &str) -> StorageResult<Option<AccountRecord>>;

    /// Insert or replace the record.
    fn update_account(&self, account: &AccountRecord) -> StorageResult<()>;
}

/// Load an account or fail with [`WalletError::AccountNotFound`].
pub(crate) fn load_account(
    store: &dyn IdentityStore,
    account_id: &str,
) -> WalletResult<AccountRecord> {
    store
        .get_account(account_id)?
        .ok_or_else(|| WalletError::AccountNotFound(account_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AccountSecurity {
        AccountSecurity::new("$argon2id$placeholder")
    }

    #[test]
    fn failures_below_threshold_stay_unlocked() {
        let now = Utc::now();
        let mut security = state();

        for n in 1..4 {
            let outcome = security.record_failure(now, 4, Duration::minutes(15));
            assert_eq!(outcome, FailureOutcome::Rejected { failed_attempts: n });
        }
        assert_eq!(security.failed_attempts(), 3);
        assert!(security.active_lock(now).is_none());
    }

    #[test]
    fn fourth_failure_locks_for_lockout_duration() {
        let now = Utc::now();
        let mut security = state();
        for _ in 0..3 {
            security.record_failure(now, 4, Duration::minutes(15));
        }

        let outcome = security.record_failure(now, 4, Duration::minutes(15));

        assert_eq!(
            outcome,
            FailureOutcome::Locked {
                until: now + Duration::minutes(15)
            }
        );
        assert_eq!(security.active_lock(now), Some(now + Duration::minutes(15)));
        assert!(security.active_lock(now + Duration::minutes(15)).is_none());
        assert!(security.lock_lapsed(now + Duration::minutes(15)));
    }

    #[test]
    fn reset_and_unlock_clear_counters() {
        let now = Utc::now();
        let mut security = state();
        security.record_failure(now, 4, Duration::minutes(15));
        security.reset_failures();
        assert_eq!(security.failed_attempts(), 0);

        security.lock(now + Duration::minutes(1));
        security.unlock();
        assert!(security.locked_until().is_none());
    }

    #[test]
    fn nonce_advances_only_on_exact_match() {
        let mut security = state();
        assert_eq!(security.nonce(), 0);

        security.advance_nonce(0).unwrap();
        assert_eq!(security.nonce(), 1);

        let err = security.advance_nonce(0).unwrap_err();
        assert!(matches!(
            err,
            WalletError::NonceMismatch {
                expected: 1,
                got: 0
            }
        ));
        let err = security.advance_nonce(5).unwrap_err();
        assert!(matches!(
            err,
            WalletError::NonceMismatch {
                expected: 1,
                got: 5
            }
        ));
        assert_eq!(security.nonce(), 1);
    }
}
