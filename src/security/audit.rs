// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit trail for security-relevant wallet actions.
//!
//! Entries are append-only. Writing an entry is best effort: a failed write
//! is reported on the `wallet_audit_fallback` tracing target and never alters
//! the outcome already decided for the primary operation.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::clock::Clock;
use super::error::{WalletError, WalletResult};
use crate::storage::StorageResult;

/// Largest page returned by [`AuditLogger::query`].
pub const MAX_AUDIT_QUERY_LIMIT: usize = 100;

/// Audited actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Session lifecycle
    SessionCreated,
    SessionRevoked,
    AllSessionsRevoked,

    // Credential failures
    CredentialRejected,
    AccountLocked,

    // Signing
    PersonalSign,
    SignTransaction,
    SendTransaction,
    SignTypedData,
    RawHashSign,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::SessionCreated => "session_created",
            AuditAction::SessionRevoked => "session_revoked",
            AuditAction::AllSessionsRevoked => "all_sessions_revoked",
            AuditAction::CredentialRejected => "credential_rejected",
            AuditAction::AccountLocked => "account_locked",
            AuditAction::PersonalSign => "personal_sign",
            AuditAction::SignTransaction => "sign_transaction",
            AuditAction::SendTransaction => "send_transaction",
            AuditAction::SignTypedData => "sign_typed_data",
            AuditAction::RawHashSign => "raw_hash_sign",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Error,
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct AuditEntry {
    /// Unique entry ID.
    pub entry_id: String,
    /// Account the action was performed for.
    pub account_id: String,
    pub action: AuditAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// Transferred value in wei, as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// A successful entry stamped with `timestamp`.
    pub fn new(
        account_id: impl Into<String>,
        action: AuditAction,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            action,
            tx_hash: None,
            nonce: None,
            amount: None,
            recipient: None,
            client_ip: None,
            user_agent: None,
            outcome: AuditOutcome::Success,
            error: None,
            timestamp,
        }
    }

    pub fn with_client(mut self, client_ip: Option<String>, user_agent: Option<String>) -> Self {
        self.client_ip = client_ip;
        self.user_agent = user_agent;
        self
    }

    pub fn with_nonce(mut self, nonce: Option<u64>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Mark as failed with the error returned to the caller.
    pub fn failed(mut self, error: &WalletError) -> Self {
        self.outcome = AuditOutcome::Error;
        self.error = Some(format!("{}: {}", error.error_code(), error));
        self
    }
}

/// Append-only storage for audit entries.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &AuditEntry) -> StorageResult<()>;

    /// Most recent entries for `account_id`, newest first.
    fn query(&self, account_id: &str, limit: usize) -> StorageResult<Vec<AuditEntry>>;
}

/// Best-effort audit writer in front of an [`AuditSink`].
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    /// Start an entry stamped with the logger's clock.
    pub fn entry(&self, account_id: &str, action: AuditAction) -> AuditEntry {
        AuditEntry::new(account_id, action, self.clock.now())
    }

    /// Persist an entry. Never fails from the caller's point of view.
    pub fn append(&self, entry: AuditEntry) {
        if let Err(e) = self.sink.append(&entry) {
            tracing::warn!(
                target: "wallet_audit_fallback",
                error = %e,
                account_id = %entry.account_id,
                action = %entry.action,
                outcome = ?entry.outcome,
                nonce = ?entry.nonce,
                tx_hash = ?entry.tx_hash,
                detail = ?entry.error,
                "Failed to persist audit entry"
            );
        }
    }

    /// Most recent entries, newest first. `limit` must be within 1..=100.
    pub fn query(&self, account_id: &str, limit: usize) -> WalletResult<Vec<AuditEntry>> {
        if limit == 0 || limit > MAX_AUDIT_QUERY_LIMIT {
            return Err(WalletError::validation(format!(
                "limit must be between 1 and {MAX_AUDIT_QUERY_LIMIT}"
            )));
        }
        Ok(self.sink.query(account_id, limit)?)
    }
}
