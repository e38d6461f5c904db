// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expiry Sweeper
//!
//! Background task that periodically removes expired sessions, lapsed
//! rate-limit windows and idle per-account locks. Expired state is already
//! rejected on access; the sweep only bounds how long dead records linger.
//!
//! Every pass is idempotent and runs concurrently with live validations.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::gateway::SigningGateway;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct ExpirySweeper {
    gateway: Arc<SigningGateway>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(gateway: Arc<SigningGateway>) -> Self {
        Self {
            gateway,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Expiry sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Expiry sweeper shutting down");
                return;
            }

            self.sweep_step();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    return;
                }
            }
        }
    }

    fn sweep_step(&self) {
        match self.gateway.sweep_expired() {
            Ok(report) if report.sessions + report.rate_windows + report.idle_locks > 0 => {
                info!(
                    sessions = report.sessions,
                    rate_windows = report.rate_windows,
                    idle_locks = report.idle_locks,
                    "Expiry sweep removed stale state"
                );
            }
            Ok(_) => debug!("Expiry sweep found nothing to remove"),
            Err(e) => warn!(error = %e, "Expiry sweep failed"),
        }
    }
}
