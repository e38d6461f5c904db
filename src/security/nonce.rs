// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Strictly sequential per-account transaction nonces.
//!
//! The stored nonce is the next value a transaction must carry. A submitted
//! nonce is accepted only if it equals the stored value, after which the
//! stored value moves forward by exactly one. The check and the increment
//! happen under the account's lock, so two concurrent submissions with the
//! same nonce can never both be accepted.

use std::sync::Arc;

use super::account::{load_account, IdentityStore};
use super::error::WalletResult;
use super::locks::AccountLocks;

pub struct NonceSequencer {
    identity: Arc<dyn IdentityStore>,
    locks: Arc<AccountLocks>,
}

impl NonceSequencer {
    pub fn new(identity: Arc<dyn IdentityStore>, locks: Arc<AccountLocks>) -> Self {
        Self { identity, locks }
    }

    /// Current stored nonce, without side effects.
    pub fn peek(&self, account_id: &str) -> WalletResult<u64> {
        let account = load_account(self.identity.as_ref(), account_id)?;
        Ok(account.security().nonce())
    }

    /// Consume `provided` if it is the expected nonce.
    pub async fn validate_and_advance(&self, account_id: &str, provided: u64) -> WalletResult<()> {
        let _guard = self.locks.acquire(account_id).await;

        let mut account = load_account(self.identity.as_ref(), account_id)?;
        if let Err(e) = account.security_mut().advance_nonce(provided) {
            tracing::warn!(account_id = %account_id, provided, error = %e, "Nonce rejected");
            return Err(e);
        }
        self.identity.update_account(&account)?;

        tracing::debug!(account_id = %account_id, consumed = provided, "Nonce advanced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::account::AccountRecord;
    use crate::security::error::WalletError;
    use crate::storage::MemoryIdentityStore;

    fn sequencer() -> Arc<NonceSequencer> {
        let identity = Arc::new(MemoryIdentityStore::new());
        identity
            .update_account(&AccountRecord::new("acct_1", "hash", Vec::new()))
            .unwrap();
        Arc::new(NonceSequencer::new(identity, Arc::new(AccountLocks::new())))
    }

    #[tokio::test]
    async fn fresh_account_starts_at_zero_and_advances_by_one() {
        let seq = sequencer();
        assert_eq!(seq.peek("acct_1").unwrap(), 0);

        seq.validate_and_advance("acct_1", 0).await.unwrap();
        assert_eq!(seq.peek("acct_1").unwrap(), 1);

        let err = seq.validate_and_advance("acct_1", 0).await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::NonceMismatch {
                expected: 1,
                got: 0
            }
        ));
        assert_eq!(seq.peek("acct_1").unwrap(), 1);
    }

    #[tokio::test]
    async fn skipping_ahead_is_rejected() {
        let seq = sequencer();
        let err = seq.validate_and_advance("acct_1", 2).await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::NonceMismatch {
                expected: 0,
                got: 2
            }
        ));
        assert_eq!(seq.peek("acct_1").unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_account() {
        let seq = sequencer();
        assert!(matches!(
            seq.peek("ghost"),
            Err(WalletError::AccountNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_of_same_nonce_admit_exactly_one() {
        let seq = sequencer();
        for n in 0..5 {
            seq.validate_and_advance("acct_1", n).await.unwrap();
        }

        let a = {
            let seq = seq.clone();
            tokio::spawn(async move { seq.validate_and_advance("acct_1", 5).await })
        };
        let b = {
            let seq = seq.clone();
            tokio::spawn(async move { seq.validate_and_advance("acct_1", 5).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(WalletError::NonceMismatch {
                expected: 6,
                got: 5
            })
        )));
        assert_eq!(seq.peek("acct_1").unwrap(), 6);
    }
}
