// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded security database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `accounts`: account_id → serialized AccountRecord
//! - `sessions`: token digest → serialized Session
//! - `account_sessions`: composite key (account_id\0digest) → ()
//! - `audit_log`: composite key (account_id\0!timestamp\0entry_id) → serialized AuditEntry
//!
//! Every mutation runs in a single write transaction, so a reader never sees
//! a session without its index entry or the other way around.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

use super::{StorageError, StorageResult};
use crate::security::account::{AccountRecord, IdentityStore};
use crate::security::audit::{AuditEntry, AuditSink};
use crate::security::session::{Session, SessionRepository};

// =============================================================================
// Table Definitions
// =============================================================================

/// account_id → serialized AccountRecord (JSON bytes).
const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

/// token digest → serialized Session (JSON bytes).
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Index of sessions per account. Key format: `len(account_id)_be32 account_id digest`.
const ACCOUNT_SESSIONS: TableDefinition<&[u8], ()> = TableDefinition::new("account_sessions");

/// Audit entries. Key format:
/// `len(account_id)_be32 account_id !timestamp_micros_be \0 entry_id`
/// so a forward scan yields newest entries first.
const AUDIT_LOG: TableDefinition<&[u8], &[u8]> = TableDefinition::new("audit_log");

const SEPARATOR: u8 = 0;

// =============================================================================
// Key Helpers
// =============================================================================

/// Length-prefixed so no account's prefix is a prefix of another's.
fn account_prefix(account_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(account_id.len() + 4);
    prefix.extend_from_slice(&(account_id.len() as u32).to_be_bytes());
    prefix.extend_from_slice(account_id.as_bytes());
    prefix
}

/// Upper bound for a range scan over one account's keys.
fn account_prefix_end(account_id: &str) -> Vec<u8> {
    let mut end = account_prefix(account_id);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

fn session_index_key(account_id: &str, digest: &str) -> Vec<u8> {
    let mut key = account_prefix(account_id);
    key.extend_from_slice(digest.as_bytes());
    key
}

fn audit_key(entry: &AuditEntry) -> Vec<u8> {
    let mut key = account_prefix(&entry.account_id);
    // Invert timestamp for descending order (newest first)
    key.extend_from_slice(&(!entry.timestamp.timestamp_micros() as u64).to_be_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(entry.entry_id.as_bytes());
    key
}

fn digest_from_index_key<'k>(key: &'k [u8], account_id: &str) -> Option<&'k str> {
    key.get(account_id.len() + 4..)
        .and_then(|rest| std::str::from_utf8(rest).ok())
}

// =============================================================================
// SecurityDatabase
// =============================================================================

/// Persistent store for accounts, sessions and the audit trail.
pub struct SecurityDatabase {
    db: Database,
}

impl SecurityDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS)?;
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(ACCOUNT_SESSIONS)?;
            let _ = write_txn.open_table(AUDIT_LOG)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Number of stored sessions (diagnostics).
    pub fn session_count(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;
        Ok(table.len()?)
    }
}

impl IdentityStore for SecurityDatabase {
    fn get_account(&self, account_id: &str) -> StorageResult<Option<AccountRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;
        match table.get(account_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn update_account(&self, account: &AccountRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(account)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACCOUNTS)?;
            table.insert(account.account_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl SessionRepository for SecurityDatabase {
    fn insert(&self, session: &Session) -> StorageResult<()> {
        let json = serde_json::to_vec(session)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut sessions = write_txn.open_table(SESSIONS)?;
            if sessions.get(session.token_digest.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists("session".to_string()));
            }
            sessions.insert(session.token_digest.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(ACCOUNT_SESSIONS)?;
            let key = session_index_key(&session.account_id, &session.token_digest);
            index.insert(key.as_slice(), ())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get(&self, token_digest: &str) -> StorageResult<Option<Session>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;
        match table.get(token_digest)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn touch(&self, token_digest: &str, at: DateTime<Utc>) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let touched = {
            let mut sessions = write_txn.open_table(SESSIONS)?;
            let existing = sessions
                .get(token_digest)?
                .map(|value| value.value().to_vec());
            match existing {
                Some(bytes) => {
                    let mut session: Session = serde_json::from_slice(&bytes)?;
                    session.last_used_at = at;
                    let json = serde_json::to_vec(&session)?;
                    sessions.insert(token_digest, json.as_slice())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(touched)
    }

    fn delete(&self, token_digest: &str) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut sessions = write_txn.open_table(SESSIONS)?;
            let removed = sessions
                .remove(token_digest)?
                .map(|value| value.value().to_vec());
            match removed {
                Some(bytes) => {
                    let session: Session = serde_json::from_slice(&bytes)?;
                    let mut index = write_txn.open_table(ACCOUNT_SESSIONS)?;
                    let key = session_index_key(&session.account_id, token_digest);
                    index.remove(key.as_slice())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn delete_for_account(&self, account_id: &str) -> StorageResult<usize> {
        let prefix = account_prefix(account_id);
        let prefix_end = account_prefix_end(account_id);

        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut index = write_txn.open_table(ACCOUNT_SESSIONS)?;
            let mut keys = Vec::new();
            for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
                let (key, _) = entry?;
                keys.push(key.value().to_vec());
            }

            let mut sessions = write_txn.open_table(SESSIONS)?;
            for key in &keys {
                if let Some(digest) = digest_from_index_key(key, account_id) {
                    sessions.remove(digest)?;
                }
                index.remove(key.as_slice())?;
            }
            keys.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut sessions = write_txn.open_table(SESSIONS)?;
            let mut expired = Vec::new();
            for entry in sessions.iter()? {
                let (digest, value) = entry?;
                let session: Session = serde_json::from_slice(value.value())?;
                if session.is_expired(now) {
                    expired.push((digest.value().to_string(), session.account_id));
                }
            }

            let mut index = write_txn.open_table(ACCOUNT_SESSIONS)?;
            for (digest, account_id) in &expired {
                sessions.remove(digest.as_str())?;
                let key = session_index_key(account_id, digest);
                index.remove(key.as_slice())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

impl AuditSink for SecurityDatabase {
    fn append(&self, entry: &AuditEntry) -> StorageResult<()> {
        let json = serde_json::to_vec(entry)?;
        let key = audit_key(entry);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUDIT_LOG)?;
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn query(&self, account_id: &str, limit: usize) -> StorageResult<Vec<AuditEntry>> {
        let prefix = account_prefix(account_id);
        let prefix_end = account_prefix_end(account_id);

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUDIT_LOG)?;

        let mut entries = Vec::with_capacity(limit);
        for entry in table.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (_, value) = entry?;
            entries.push(serde_json::from_slice(value.value())?);
            if entries.len() >= limit {
                break;
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::audit::AuditAction;
    use chrono::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SecurityDatabase) {
        let temp = TempDir::new().unwrap();
        let db = SecurityDatabase::open(&temp.path().join("security.redb")).unwrap();
        (temp, db)
    }

    fn session(digest: &str, account: &str, expires_at: DateTime<Utc>) -> Session {
        Session {
            session_id: uuid::Uuid::new_v4().to_string(),
            account_id: account.to_string(),
            token_digest: digest.to_string(),
            created_at: expires_at - Duration::minutes(30),
            expires_at,
            last_used_at: expires_at - Duration::minutes(30),
            client_ip: Some("198.51.100.4".to_string()),
            user_agent: None,
        }
    }

    #[test]
    fn account_roundtrip_preserves_security_state() {
        let (_temp, db) = setup();
        let mut account = AccountRecord::new("acct_1", "hash", vec![1, 2, 3]);
        account.security_mut().advance_nonce(0).unwrap();
        db.update_account(&account).unwrap();

        let loaded = db.get_account("acct_1").unwrap().unwrap();
        assert_eq!(loaded, account);
        assert_eq!(loaded.security().nonce(), 1);
        assert!(db.get_account("missing").unwrap().is_none());
    }

    #[test]
    fn session_lifecycle() {
        let (_temp, db) = setup();
        let now = Utc::now();
        db.insert(&session("d1", "acct_1", now + Duration::minutes(30)))
            .unwrap();

        assert!(db.touch("d1", now + Duration::minutes(1)).unwrap());
        let stored = db.get("d1").unwrap().unwrap();
        assert_eq!(stored.last_used_at, now + Duration::minutes(1));

        assert!(db.delete("d1").unwrap());
        assert!(!db.delete("d1").unwrap());
        assert!(!db.touch("d1", now).unwrap());
        assert_eq!(db.session_count().unwrap(), 0);
    }

    #[test]
    fn delete_for_account_does_not_match_longer_ids() {
        let (_temp, db) = setup();
        let exp = Utc::now() + Duration::minutes(30);
        db.insert(&session("d1", "acct", exp)).unwrap();
        db.insert(&session("d2", "acct", exp)).unwrap();
        db.insert(&session("d3", "acct_other", exp)).unwrap();

        assert_eq!(db.delete_for_account("acct").unwrap(), 2);
        assert!(db.get("d1").unwrap().is_none());
        assert!(db.get("d2").unwrap().is_none());
        assert!(db.get("d3").unwrap().is_some());
    }

    #[test]
    fn account_ids_sharing_a_nul_prefix_stay_separate() {
        let (_temp, db) = setup();
        let exp = Utc::now() + Duration::minutes(30);
        db.insert(&session("d1", "a", exp)).unwrap();
        db.insert(&session("d2", "a\0b", exp)).unwrap();
        db.append(&AuditEntry::new("a\0b", AuditAction::SessionCreated, Utc::now()))
            .unwrap();

        assert!(db.query("a", 10).unwrap().is_empty());
        assert_eq!(db.delete_for_account("a").unwrap(), 1);
        assert!(db.get("d2").unwrap().is_some());
        assert_eq!(db.delete_for_account("a\0b").unwrap(), 1);
    }

    #[test]
    fn delete_expired_cleans_index() {
        let (_temp, db) = setup();
        let now = Utc::now();
        db.insert(&session("old", "acct", now - Duration::seconds(1)))
            .unwrap();
        db.insert(&session("new", "acct", now + Duration::minutes(5)))
            .unwrap();

        assert_eq!(db.delete_expired(now).unwrap(), 1);
        assert_eq!(db.delete_expired(now).unwrap(), 0);
        // Only the live session is left for bulk revocation.
        assert_eq!(db.delete_for_account("acct").unwrap(), 1);
    }

    #[test]
    fn audit_query_is_newest_first_and_scoped() {
        let (_temp, db) = setup();
        let t0 = Utc::now();
        for i in 0..4 {
            db.append(&AuditEntry::new(
                "acct",
                AuditAction::SignTransaction,
                t0 + Duration::seconds(i),
            )
            .with_nonce(Some(i as u64)))
            .unwrap();
        }
        db.append(&AuditEntry::new("acct_2", AuditAction::SignTransaction, t0))
            .unwrap();

        let entries = db.query("acct", 3).unwrap();
        let nonces: Vec<_> = entries.iter().map(|e| e.nonce).collect();
        assert_eq!(nonces, vec![Some(3), Some(2), Some(1)]);
        assert_eq!(db.query("acct_2", 10).unwrap().len(), 1);
    }
}
