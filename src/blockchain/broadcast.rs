// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Raw transaction broadcasting over JSON-RPC.

use alloy::{
    network::Ethereum,
    providers::{Provider, RootProvider},
};
use async_trait::async_trait;

use super::signing::SignedEnvelope;
use super::types::ChainConfig;
use super::ChainError;

/// Submits signed transactions to the network.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Broadcast an encoded transaction, returning the hash reported by the node.
    async fn broadcast(&self, signed: &SignedEnvelope) -> Result<String, ChainError>;
}

/// Broadcaster backed by a plain HTTP JSON-RPC provider.
///
/// No fillers: nonce, gas and chain ID are all fixed before signing.
pub struct RpcBroadcaster {
    chain: ChainConfig,
    provider: RootProvider<Ethereum>,
}

impl RpcBroadcaster {
    pub fn new(chain: ChainConfig) -> Result<Self, ChainError> {
        let url: url::Url = chain
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;

        let provider = RootProvider::<Ethereum>::new_http(url);

        Ok(Self { chain, provider })
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }
}

#[async_trait]
impl Broadcaster for RpcBroadcaster {
    async fn broadcast(&self, signed: &SignedEnvelope) -> Result<String, ChainError> {
        let pending = self
            .provider
            .send_raw_transaction(&signed.raw)
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;

        let tx_hash = *pending.tx_hash();
        if tx_hash != signed.tx_hash {
            tracing::warn!(
                chain = %self.chain.name,
                local = %signed.tx_hash,
                remote = %tx_hash,
                "Node reported a different transaction hash"
            );
        }
        Ok(tx_hash.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_rpc_url() {
        let chain = ChainConfig {
            rpc_url: "not a url".to_string(),
            ..ChainConfig::fuji()
        };
        assert!(matches!(
            RpcBroadcaster::new(chain),
            Err(ChainError::InvalidRpcUrl(_))
        ));
    }

    #[test]
    fn builds_for_fuji() {
        let broadcaster = RpcBroadcaster::new(ChainConfig::fuji()).unwrap();
        assert_eq!(broadcaster.chain().chain_id, 43113);
    }
}
