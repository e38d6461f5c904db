// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process stores.
//!
//! Used by tests and single-instance development setups. Each map is
//! sharded, so operations on different keys do not contend on one lock.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};

use super::{StorageError, StorageResult};
use crate::security::account::{AccountRecord, IdentityStore};
use crate::security::audit::{AuditEntry, AuditSink};
use crate::security::rate_limit::{CounterStore, RateWindow};
use crate::security::session::{Session, SessionRepository};

/// Account records keyed by account ID.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    accounts: DashMap<String, AccountRecord>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get_account(&self, account_id: &str) -> StorageResult<Option<AccountRecord>> {
        Ok(self.accounts.get(account_id).map(|a| a.clone()))
    }

    fn update_account(&self, account: &AccountRecord) -> StorageResult<()> {
        self.accounts
            .insert(account.account_id.clone(), account.clone());
        Ok(())
    }
}

/// Sessions keyed by token digest.
#[derive(Debug, Default)]
pub struct MemorySessionRepository {
    sessions: DashMap<String, Session>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionRepository for MemorySessionRepository {
    fn insert(&self, session: &Session) -> StorageResult<()> {
        match self.sessions.entry(session.token_digest.clone()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists("session".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    fn get(&self, token_digest: &str) -> StorageResult<Option<Session>> {
        Ok(self.sessions.get(token_digest).map(|s| s.clone()))
    }

    fn touch(&self, token_digest: &str, at: DateTime<Utc>) -> StorageResult<bool> {
        match self.sessions.get_mut(token_digest) {
            Some(mut session) => {
                session.last_used_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, token_digest: &str) -> StorageResult<bool> {
        Ok(self.sessions.remove(token_digest).is_some())
    }

    fn delete_for_account(&self, account_id: &str) -> StorageResult<usize> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.account_id != account_id);
        Ok(before.saturating_sub(self.sessions.len()))
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        Ok(before.saturating_sub(self.sessions.len()))
    }
}

/// Append-only audit log held in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, entry: &AuditEntry) -> StorageResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("audit log poisoned".to_string()))?;
        entries.push(entry.clone());
        Ok(())
    }

    fn query(&self, account_id: &str, limit: usize) -> StorageResult<Vec<AuditEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("audit log poisoned".to_string()))?;
        // Newest first; ties keep reverse append order.
        let mut matching: Vec<AuditEntry> = entries
            .iter()
            .rev()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }
}

/// Rate-limit windows keyed by account ID.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, RateWindow>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl CounterStore for MemoryCounterStore {
    fn increment(&self, key: &str, now: DateTime<Utc>, window: Duration) -> StorageResult<u32> {
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| RateWindow::open(now, window));
        if entry.is_expired(now) {
            *entry = RateWindow::open(now, window);
        }
        entry.count = entry.count.saturating_add(1);
        Ok(entry.count)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.is_expired(now));
        Ok(before.saturating_sub(self.windows.len()))
    }
}
