// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence for the wallet security core.
//!
//! - [`SecurityDatabase`] keeps accounts, sessions and the audit trail in an
//!   embedded redb file under the data directory.
//! - The `Memory*` stores back tests and single-process development.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   security/
//!     security.redb   # accounts, sessions, session index, audit log
//! ```

pub mod memory;
pub mod paths;
pub mod security_db;

pub use memory::{MemoryAuditSink, MemoryCounterStore, MemoryIdentityStore, MemorySessionRepository};
pub use paths::StoragePaths;
pub use security_db::SecurityDatabase;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
