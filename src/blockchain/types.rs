// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain configuration and signing payload types.

use std::str::FromStr;

use alloy::{
    consensus::TxEip1559,
    primitives::{Address, Bytes, TxKind, B256, U256},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ChainError;

/// Avalanche Fuji testnet chain ID (default deployment target).
pub const FUJI_CHAIN_ID: u64 = 43113;

/// Avalanche Fuji public RPC endpoint.
pub const FUJI_RPC_URL: &str = "https://api.avax-test.network/ext/bc/C/rpc";

/// EVM network the service signs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Network name for display
    pub name: String,
    /// Chain ID used when a transaction does not name one
    pub chain_id: u64,
    /// RPC endpoint URL for broadcasting
    pub rpc_url: String,
}

impl ChainConfig {
    pub fn fuji() -> Self {
        Self {
            name: "Avalanche Fuji Testnet".to_string(),
            chain_id: FUJI_CHAIN_ID,
            rpc_url: FUJI_RPC_URL.to_string(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::fuji()
    }
}

/// Unsigned EIP-1559 transaction as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnsignedTransaction {
    /// Recipient address (0x + 40 hex chars)
    pub to: String,
    /// Value in wei (decimal or 0x-prefixed hex)
    #[serde(default = "default_value")]
    pub value: String,
    /// Calldata (0x-prefixed hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Account nonce this transaction consumes
    pub nonce: u64,
    /// Gas limit
    pub gas_limit: u64,
    /// Max fee per gas in wei
    pub max_fee_per_gas: String,
    /// Max priority fee per gas in wei
    pub max_priority_fee_per_gas: String,
    /// Chain ID (defaults to the configured network)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

fn default_value() -> String {
    "0".to_string()
}

/// A validated transaction ready for signing.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTransaction {
    pub tx: TxEip1559,
    pub recipient: Address,
    pub value: U256,
}

impl UnsignedTransaction {
    /// Validate every field and build the EIP-1559 body.
    pub fn prepare(&self, default_chain_id: u64) -> Result<PreparedTransaction, ChainError> {
        let recipient = parse_address(&self.to)?;
        let value = parse_u256(&self.value, "value")?;
        let max_fee_per_gas = parse_u128(&self.max_fee_per_gas, "max_fee_per_gas")?;
        let max_priority_fee_per_gas =
            parse_u128(&self.max_priority_fee_per_gas, "max_priority_fee_per_gas")?;

        if self.gas_limit == 0 {
            return Err(ChainError::InvalidPayload(
                "gas_limit must be greater than zero".to_string(),
            ));
        }
        if max_priority_fee_per_gas > max_fee_per_gas {
            return Err(ChainError::InvalidPayload(
                "max_priority_fee_per_gas exceeds max_fee_per_gas".to_string(),
            ));
        }

        let input = match self.data.as_deref() {
            Some(data) if !data.is_empty() => Bytes::from(
                alloy::hex::decode(data)
                    .map_err(|e| ChainError::InvalidPayload(format!("Invalid data: {e}")))?,
            ),
            _ => Bytes::new(),
        };

        let tx = TxEip1559 {
            chain_id: self.chain_id.unwrap_or(default_chain_id),
            nonce: self.nonce,
            gas_limit: self.gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to: TxKind::Call(recipient),
            value,
            access_list: Default::default(),
            input,
        };

        Ok(PreparedTransaction {
            tx,
            recipient,
            value,
        })
    }
}

/// Signature over a message, typed-data payload or raw hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignatureResult {
    /// 65-byte r || s || v signature, 0x-prefixed hex
    pub signature: String,
    /// Digest that was signed
    pub signed_hash: String,
    /// Signing address
    pub address: String,
}

/// Signed transaction, not yet broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignedTransaction {
    /// EIP-2718 encoded transaction, 0x-prefixed hex
    pub raw_transaction: String,
    /// Transaction hash
    pub tx_hash: String,
    /// Nonce consumed by this transaction
    pub nonce: u64,
    /// Sender address
    pub from: String,
}

/// Transaction accepted by the network.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SentTransaction {
    /// Transaction hash
    pub tx_hash: String,
    /// Nonce consumed by this transaction
    pub nonce: u64,
    /// Sender address
    pub from: String,
}

/// Validate an Ethereum address and parse it.
pub fn parse_address(address: &str) -> Result<Address, ChainError> {
    if !address.starts_with("0x") {
        return Err(ChainError::InvalidAddress(
            "Address must start with 0x".to_string(),
        ));
    }
    if address.len() != 42 {
        return Err(ChainError::InvalidAddress(
            "Address must be 42 characters (0x + 40 hex)".to_string(),
        ));
    }
    Address::from_str(address).map_err(|e| ChainError::InvalidAddress(e.to_string()))
}

/// Parse a 32-byte hash given as 0x-prefixed hex.
pub fn parse_hash(hash: &str) -> Result<B256, ChainError> {
    B256::from_str(hash.trim())
        .map_err(|e| ChainError::InvalidPayload(format!("Invalid 32-byte hash: {e}")))
}

fn parse_u256(raw: &str, field: &str) -> Result<U256, ChainError> {
    U256::from_str(raw.trim())
        .map_err(|e| ChainError::InvalidAmount(format!("Invalid {field}: {e}")))
}

fn parse_u128(raw: &str, field: &str) -> Result<u128, ChainError> {
    raw.trim()
        .parse::<u128>()
        .map_err(|e| ChainError::InvalidAmount(format!("Invalid {field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> UnsignedTransaction {
        UnsignedTransaction {
            to: "0x2222222222222222222222222222222222222222".to_string(),
            value: "1000000000000000000".to_string(),
            data: None,
            nonce: 0,
            gas_limit: 21_000,
            max_fee_per_gas: "30000000000".to_string(),
            max_priority_fee_per_gas: "1500000000".to_string(),
            chain_id: None,
        }
    }

    #[test]
    fn prepare_fills_default_chain_id() {
        let prepared = tx().prepare(FUJI_CHAIN_ID).unwrap();
        assert_eq!(prepared.tx.chain_id, FUJI_CHAIN_ID);
        assert_eq!(prepared.tx.gas_limit, 21_000);
        assert_eq!(prepared.value, U256::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn prepare_rejects_bad_fields() {
        let mut bad = tx();
        bad.to = "2222222222222222222222222222222222222222".to_string();
        assert!(matches!(
            bad.prepare(1),
            Err(ChainError::InvalidAddress(_))
        ));

        let mut bad = tx();
        bad.value = "lots".to_string();
        assert!(matches!(bad.prepare(1), Err(ChainError::InvalidAmount(_))));

        let mut bad = tx();
        bad.max_priority_fee_per_gas = "40000000000".to_string();
        assert!(matches!(bad.prepare(1), Err(ChainError::InvalidPayload(_))));

        let mut bad = tx();
        bad.gas_limit = 0;
        assert!(matches!(bad.prepare(1), Err(ChainError::InvalidPayload(_))));

        let mut bad = tx();
        bad.data = Some("0xzz".to_string());
        assert!(matches!(bad.prepare(1), Err(ChainError::InvalidPayload(_))));
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{
            "to": "0x2222222222222222222222222222222222222222",
            "nonce": 3,
            "gas_limit": 21000,
            "max_fee_per_gas": "1",
            "max_priority_fee_per_gas": "1"
        }"#;
        let parsed: UnsignedTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.value, "0");
        assert_eq!(parsed.nonce, 3);
        assert!(parsed.chain_id.is_none());
    }

    #[test]
    fn parse_hash_requires_32_bytes() {
        assert!(parse_hash(&format!("0x{}", "ab".repeat(32))).is_ok());
        assert!(parse_hash("0xabcd").is_err());
    }
}
