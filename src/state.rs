// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::IdentityVerifier;
use crate::security::SigningGateway;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<SigningGateway>,
    pub identity: Arc<IdentityVerifier>,
    /// Data directory checked by the health endpoint.
    pub data_dir: Option<PathBuf>,
    /// Take the client IP from forwarding headers instead of the socket peer.
    pub trust_proxy_headers: bool,
}

impl AppState {
    pub fn new(gateway: Arc<SigningGateway>, identity: IdentityVerifier) -> Self {
        Self {
            gateway,
            identity: Arc::new(identity),
            data_dir: None,
            trust_proxy_headers: false,
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn with_trusted_proxy(mut self, trusted: bool) -> Self {
        self.trust_proxy_headers = trusted;
        self
    }
}

#[cfg(test)]
pub(crate) const TEST_ACCOUNT: &str = "acct_1";
#[cfg(test)]
pub(crate) const TEST_PASSWORD: &str = "correct horse battery staple";
#[cfg(test)]
pub(crate) const TEST_KEY: [u8; 32] = [0x11; 32];

#[cfg(test)]
pub(crate) struct TestApp {
    pub state: AppState,
    pub identity: Arc<crate::storage::MemoryIdentityStore>,
}

/// In-memory application with one provisioned account.
#[cfg(test)]
pub(crate) fn test_app() -> TestApp {
    use crate::auth::claims::test_tokens;
    use crate::blockchain::{signing::SignedEnvelope, Broadcaster, ChainConfig, ChainError};
    use crate::config::SecurityPolicy;
    use crate::custody::{KeyEncryptionKey, LocalKeyCustody};
    use crate::security::{
        hash_password, AccountRecord, GatewayBackends, IdentityStore, SystemClock,
    };
    use crate::storage::{
        MemoryAuditSink, MemoryCounterStore, MemoryIdentityStore, MemorySessionRepository,
    };

    struct EchoBroadcaster;

    #[async_trait::async_trait]
    impl Broadcaster for EchoBroadcaster {
        async fn broadcast(&self, signed: &SignedEnvelope) -> Result<String, ChainError> {
            Ok(signed.tx_hash.to_string())
        }
    }

    let kek = [0x07; 32];
    let sealed = LocalKeyCustody::new()
        .seal(&TEST_KEY, &KeyEncryptionKey::from_bytes(kek))
        .unwrap();
    let identity = Arc::new(MemoryIdentityStore::new());
    identity
        .update_account(&AccountRecord::new(
            TEST_ACCOUNT,
            hash_password(TEST_PASSWORD).unwrap(),
            sealed,
        ))
        .unwrap();

    let gateway = SigningGateway::new(
        GatewayBackends {
            identity: identity.clone(),
            sessions: Arc::new(MemorySessionRepository::new()),
            audit: Arc::new(MemoryAuditSink::new()),
            counters: Arc::new(MemoryCounterStore::new()),
            custody: Arc::new(LocalKeyCustody::new()),
            broadcaster: Arc::new(EchoBroadcaster),
            clock: Arc::new(SystemClock),
        },
        KeyEncryptionKey::from_bytes(kek),
        ChainConfig::fuji(),
        SecurityPolicy::default(),
    );

    TestApp {
        state: AppState::new(
            Arc::new(gateway),
            IdentityVerifier::hs256(test_tokens::SECRET),
        ),
        identity,
    }
}
