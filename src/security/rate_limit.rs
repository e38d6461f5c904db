// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-window rate limiting of signing operations.
//!
//! The first increment for an account opens a window that ends one window
//! length later. Every call increments; calls beyond the limit within the
//! window are refused. Counters sit behind [`CounterStore`] so a store
//! shared between instances can replace the in-process default.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::clock::Clock;
use crate::storage::StorageResult;

/// Counter state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindow {
    pub count: u32,
    pub expires_at: DateTime<Utc>,
}

impl RateWindow {
    pub fn open(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 0,
            expires_at: now + window,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Per-key counters with a TTL. `increment` must be atomic per key.
pub trait CounterStore: Send + Sync {
    /// Increment `key`, opening a new window of length `window` when none is
    /// active. Returns the count after the increment.
    fn increment(&self, key: &str, now: DateTime<Utc>, window: Duration) -> StorageResult<u32>;

    fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<usize>;
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        limit: u32,
        window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            limit,
            window,
        }
    }

    /// Count one operation for `account_id`; `false` once the window's
    /// budget is spent. Fails closed if the counter store is unavailable.
    pub fn allow(&self, account_id: &str) -> bool {
        match self
            .store
            .increment(account_id, self.clock.now(), self.window)
        {
            Ok(count) if count <= self.limit => true,
            Ok(count) => {
                tracing::warn!(account_id = %account_id, count, limit = self.limit, "Signing rate limit exceeded");
                false
            }
            Err(e) => {
                tracing::error!(account_id = %account_id, error = %e, "Rate limit store unavailable");
                false
            }
        }
    }

    pub fn purge_expired(&self) -> StorageResult<usize> {
        self.store.delete_expired(self.clock.now())
    }
}
