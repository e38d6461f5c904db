// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy for the wallet security core.
//!
//! Every failure is returned to the direct caller as a typed value. Errors
//! caused by external collaborators (key custody, chain broadcast) carry the
//! account, action and nonce so an audit entry can be reconstructed even if
//! the audit write itself fails later.

use chrono::{DateTime, Utc};

use super::audit::AuditAction;
use crate::storage::StorageError;

/// Errors surfaced by the credential verifier, session store, nonce
/// sequencer, rate limiter and signing gateway.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("session not found")]
    SessionNotFound,

    #[error("session expired")]
    SessionExpired,

    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("key decryption failed for account {account_id} during {action}: {reason}")]
    KeyDecryptionFailed {
        account_id: String,
        action: AuditAction,
        nonce: Option<u64>,
        reason: String,
    },

    #[error("signing failed for account {account_id} during {action}: {reason}")]
    SigningFailed {
        account_id: String,
        action: AuditAction,
        nonce: Option<u64>,
        reason: String,
    },

    #[error("broadcast failed for account {account_id} (nonce {nonce}, tx {tx_hash}): {reason}")]
    BroadcastFailed {
        account_id: String,
        nonce: u64,
        tx_hash: String,
        reason: String,
    },

    /// The transaction was signed and handed to the broadcaster but no answer
    /// arrived before the deadline. The nonce stays consumed; callers must
    /// fetch a fresh nonce instead of resubmitting this one.
    #[error("outcome uncertain for account {account_id} (nonce {nonce}, tx {tx_hash}): broadcast timed out")]
    OutcomeUncertain {
        account_id: String,
        nonce: u64,
        tx_hash: String,
    },

    #[error("{action} for account {account_id} timed out during {stage}")]
    Timeout {
        account_id: String,
        action: AuditAction,
        nonce: Option<u64>,
        stage: &'static str,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Stable machine-readable code for API consumers and audit details.
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::InvalidCredentials => "invalid_credentials",
            WalletError::AccountLocked { .. } => "account_locked",
            WalletError::AccountNotFound(_) => "account_not_found",
            WalletError::SessionNotFound => "session_not_found",
            WalletError::SessionExpired => "session_expired",
            WalletError::NonceMismatch { .. } => "nonce_mismatch",
            WalletError::RateLimitExceeded => "rate_limit_exceeded",
            WalletError::KeyDecryptionFailed { .. } => "key_decryption_failed",
            WalletError::SigningFailed { .. } => "signing_failed",
            WalletError::BroadcastFailed { .. } => "broadcast_failed",
            WalletError::OutcomeUncertain { .. } => "outcome_uncertain",
            WalletError::Timeout { .. } => "timeout",
            WalletError::ValidationError(_) => "validation_error",
            WalletError::Storage(_) => "storage_error",
            WalletError::Internal(_) => "internal_error",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        WalletError::ValidationError(message.into())
    }
}

pub type WalletResult<T> = Result<T, WalletError>;
