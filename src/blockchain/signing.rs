// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing primitives over decrypted key material.
//!
//! Custodied keys are stored either as raw 32-byte secp256k1 scalars or as
//! SEC1/PKCS#8 PEM documents. Everything here is synchronous and CPU-bound;
//! callers run it on the blocking pool.

use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope},
    dyn_abi::TypedData,
    eips::eip2718::Encodable2718,
    network::TxSignerSync,
    primitives::{Signature, B256},
    signers::{local::PrivateKeySigner, SignerSync},
};
use k256::SecretKey;
use zeroize::Zeroize;

use super::ChainError;

/// Length of a raw secp256k1 private key.
pub const RAW_KEY_LEN: usize = 32;

/// A signed EIP-2718 envelope and its hash.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub raw: Vec<u8>,
    pub tx_hash: B256,
}

/// Build a signer from decrypted key material.
///
/// Accepts a raw 32-byte scalar or a PEM-encoded key.
pub fn signer_from_key_material(material: &[u8]) -> Result<PrivateKeySigner, ChainError> {
    if material.len() == RAW_KEY_LEN {
        return PrivateKeySigner::from_slice(material)
            .map_err(|e| ChainError::InvalidPrivateKey(e.to_string()));
    }
    signer_from_pem(material)
}

/// Create a signer from a PEM-encoded private key.
pub fn signer_from_pem(pem_bytes: &[u8]) -> Result<PrivateKeySigner, ChainError> {
    let secret_key = secret_from_pem(pem_bytes)?;
    let mut key_bytes = secret_key.to_bytes();
    let signer = PrivateKeySigner::from_slice(key_bytes.as_slice())
        .map_err(|e| ChainError::InvalidPrivateKey(e.to_string()));
    key_bytes.as_mut_slice().zeroize();
    signer
}

fn secret_from_pem(pem_bytes: &[u8]) -> Result<SecretKey, ChainError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| ChainError::InvalidPrivateKey(format!("Invalid UTF-8: {}", e)))?;

    let pem = pem::parse(pem_str)
        .map_err(|e| ChainError::InvalidPrivateKey(format!("Invalid PEM: {}", e)))?;

    // SEC1 first, then PKCS#8
    SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| {
            use k256::pkcs8::DecodePrivateKey;
            SecretKey::from_pkcs8_der(pem.contents())
        })
        .map_err(|e| ChainError::InvalidPrivateKey(format!("Invalid key format: {}", e)))
}

/// Interpret a personal_sign message.
///
/// `0x`-prefixed hex is signed as bytes, anything else as UTF-8 text.
pub fn message_bytes(message: &str) -> Vec<u8> {
    if let Some(stripped) = message.strip_prefix("0x") {
        if let Ok(bytes) = alloy::hex::decode(stripped) {
            return bytes;
        }
    }
    message.as_bytes().to_vec()
}

/// EIP-191 personal message signature. Returns the prefixed digest and signature.
pub fn sign_personal_message(
    signer: &PrivateKeySigner,
    message: &[u8],
) -> Result<(B256, Signature), ChainError> {
    let digest = alloy::primitives::eip191_hash_message(message);
    let signature = signer
        .sign_message_sync(message)
        .map_err(|e| ChainError::Signing(e.to_string()))?;
    Ok((digest, signature))
}

/// Sign an arbitrary 32-byte digest without any prefixing.
pub fn sign_raw_hash(signer: &PrivateKeySigner, hash: &B256) -> Result<Signature, ChainError> {
    signer
        .sign_hash_sync(hash)
        .map_err(|e| ChainError::Signing(e.to_string()))
}

/// EIP-712 signing hash of a typed data payload.
pub fn typed_data_hash(typed_data: &TypedData) -> Result<B256, ChainError> {
    typed_data
        .eip712_signing_hash()
        .map_err(|e| ChainError::InvalidPayload(format!("Invalid typed data: {e}")))
}

/// Sign an EIP-1559 transaction and encode it as an EIP-2718 envelope.
pub fn sign_transaction(
    signer: &PrivateKeySigner,
    mut tx: TxEip1559,
) -> Result<SignedEnvelope, ChainError> {
    let signature = signer
        .sign_transaction_sync(&mut tx)
        .map_err(|e| ChainError::Signing(e.to_string()))?;
    let signed = tx.into_signed(signature);
    let tx_hash = *signed.hash();
    let envelope = TxEnvelope::from(signed);
    Ok(SignedEnvelope {
        raw: envelope.encoded_2718(),
        tx_hash,
    })
}

/// Hex-encode a signature as 65 bytes (r || s || v).
pub fn signature_hex(signature: &Signature) -> String {
    alloy::hex::encode_prefixed(signature.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, TxKind, U256};
    use k256::pkcs8::{EncodePrivateKey, LineEnding};

    const KEY: [u8; 32] = [0x11; 32];

    fn signer() -> PrivateKeySigner {
        signer_from_key_material(&KEY).unwrap()
    }

    #[test]
    fn raw_and_pem_keys_yield_same_address() {
        let secret = SecretKey::from_slice(&KEY).unwrap();
        let pkcs8 = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
        let sec1 = secret.to_sec1_pem(LineEnding::LF).unwrap();

        let from_pkcs8 = signer_from_key_material(pkcs8.as_bytes()).unwrap();
        let from_sec1 = signer_from_key_material(sec1.as_bytes()).unwrap();
        assert_eq!(from_pkcs8.address(), signer().address());
        assert_eq!(from_sec1.address(), signer().address());
    }

    #[test]
    fn garbage_key_material_is_rejected() {
        assert!(matches!(
            signer_from_key_material(b"not a key"),
            Err(ChainError::InvalidPrivateKey(_))
        ));
        assert!(signer_from_key_material(&[0u8; 32]).is_err());
    }

    #[test]
    fn message_bytes_decodes_hex() {
        assert_eq!(message_bytes("0x48656c6c6f"), b"Hello".to_vec());
        assert_eq!(message_bytes("Hello"), b"Hello".to_vec());
        assert_eq!(message_bytes("0xnothex"), b"0xnothex".to_vec());
    }

    #[test]
    fn personal_signature_recovers_signer() {
        let signer = signer();
        let (digest, signature) = sign_personal_message(&signer, b"hello").unwrap();
        let recovered = signature.recover_address_from_prehash(&digest).unwrap();
        assert_eq!(recovered, signer.address());
        assert_eq!(signature_hex(&signature).len(), 2 + 130);
    }

    #[test]
    fn raw_hash_signature_recovers_signer() {
        let signer = signer();
        let hash = B256::repeat_byte(0x42);
        let signature = sign_raw_hash(&signer, &hash).unwrap();
        assert_eq!(
            signature.recover_address_from_prehash(&hash).unwrap(),
            signer.address()
        );
    }

    #[test]
    fn typed_data_signature_recovers_signer() {
        let json = serde_json::json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "chainId", "type": "uint256"}
                ],
                "Mail": [
                    {"name": "contents", "type": "string"}
                ]
            },
            "primaryType": "Mail",
            "domain": {"name": "Wallet Guard", "chainId": 43113},
            "message": {"contents": "hello"}
        });
        let typed: TypedData = serde_json::from_value(json).unwrap();
        let signer = signer();
        let hash = typed_data_hash(&typed).unwrap();
        let signature = sign_raw_hash(&signer, &hash).unwrap();
        assert_eq!(
            signature.recover_address_from_prehash(&hash).unwrap(),
            signer.address()
        );
    }

    #[test]
    fn typed_data_with_unknown_primary_type_is_invalid() {
        let json = serde_json::json!({
            "types": {"EIP712Domain": []},
            "primaryType": "Missing",
            "domain": {},
            "message": {}
        });
        // Rejected either while parsing or while hashing.
        if let Ok(typed) = serde_json::from_value::<TypedData>(json) {
            assert!(matches!(
                typed_data_hash(&typed),
                Err(ChainError::InvalidPayload(_))
            ));
        }
    }

    #[test]
    fn transaction_is_encoded_as_eip1559_envelope() {
        let tx = TxEip1559 {
            chain_id: 43113,
            nonce: 7,
            gas_limit: 21_000,
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 1_500_000_000,
            to: TxKind::Call(Address::repeat_byte(0x22)),
            value: U256::from(1u64),
            access_list: Default::default(),
            input: Default::default(),
        };
        let signed = sign_transaction(&signer(), tx).unwrap();
        // EIP-2718 type byte for EIP-1559
        assert_eq!(signed.raw[0], 0x02);
        assert_eq!(alloy::primitives::keccak256(&signed.raw), signed.tx_hash);
    }
}
