// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key custody: unsealing account private keys for a single signing call.
//!
//! Sealed blobs are `nonce (12 bytes) || ChaCha20-Poly1305 ciphertext`,
//! encrypted under a 32-byte key-encryption key (KEK). Decrypted material is
//! returned in a [`Zeroizing`] buffer and is wiped when the caller drops it.
//! Nothing here caches or logs key material.

use async_trait::async_trait;
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// ChaCha20-Poly1305 nonce length.
pub const NONCE_LEN: usize = 12;

/// Key-encryption key length.
pub const KEK_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    #[error("sealed key is malformed: {0}")]
    Malformed(String),

    #[error("authentication tag mismatch (wrong KEK or tampered blob)")]
    Authentication,

    #[error("invalid key-encryption key: {0}")]
    InvalidKek(String),

    #[error("randomness unavailable")]
    Randomness,
}

/// 256-bit key-encryption key. Wiped on drop, never printed.
#[derive(Clone)]
pub struct KeyEncryptionKey(Zeroizing<[u8; KEK_LEN]>);

impl KeyEncryptionKey {
    pub fn from_bytes(bytes: [u8; KEK_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parse 64 hex characters (an optional `0x` prefix is accepted).
    pub fn from_hex(hex: &str) -> Result<Self, CustodyError> {
        let bytes = Zeroizing::new(
            alloy::hex::decode(hex.trim())
                .map_err(|e| CustodyError::InvalidKek(e.to_string()))?,
        );
        let array: [u8; KEK_LEN] = bytes.as_slice().try_into().map_err(|_| {
            CustodyError::InvalidKek(format!("expected {KEK_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_bytes(array))
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.0.as_slice()))
    }
}

impl std::fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyEncryptionKey(<redacted>)")
    }
}

/// Key-custody collaborator.
#[async_trait]
pub trait KeyCustody: Send + Sync {
    async fn decrypt(
        &self,
        ciphertext: &[u8],
        kek: &KeyEncryptionKey,
    ) -> Result<Zeroizing<Vec<u8>>, CustodyError>;
}

/// In-process custody using ChaCha20-Poly1305.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalKeyCustody;

impl LocalKeyCustody {
    pub fn new() -> Self {
        Self
    }

    /// Seal raw key material for storage on an account record.
    pub fn seal(&self, plaintext: &[u8], kek: &KeyEncryptionKey) -> Result<Vec<u8>, CustodyError> {
        let mut nonce = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce)
            .map_err(|_| CustodyError::Randomness)?;

        let ciphertext = kek
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CustodyError::Malformed("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8], kek: &KeyEncryptionKey) -> Result<Zeroizing<Vec<u8>>, CustodyError> {
        if sealed.len() <= NONCE_LEN {
            return Err(CustodyError::Malformed(format!(
                "sealed key too short ({} bytes)",
                sealed.len()
            )));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        kek.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| CustodyError::Authentication)
    }
}

#[async_trait]
impl KeyCustody for LocalKeyCustody {
    async fn decrypt(
        &self,
        ciphertext: &[u8],
        kek: &KeyEncryptionKey,
    ) -> Result<Zeroizing<Vec<u8>>, CustodyError> {
        self.open(ciphertext, kek)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kek(byte: u8) -> KeyEncryptionKey {
        KeyEncryptionKey::from_bytes([byte; KEK_LEN])
    }

    #[tokio::test]
    async fn seal_then_decrypt() {
        let custody = LocalKeyCustody::new();
        let sealed = custody.seal(&[0x42; 32], &kek(7)).unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + 32 + 16);

        let opened = custody.decrypt(&sealed, &kek(7)).await.unwrap();
        assert_eq!(opened.as_slice(), &[0x42; 32]);
    }

    #[tokio::test]
    async fn wrong_kek_fails_authentication() {
        let custody = LocalKeyCustody::new();
        let sealed = custody.seal(&[1; 32], &kek(7)).unwrap();
        assert!(matches!(
            custody.decrypt(&sealed, &kek(8)).await,
            Err(CustodyError::Authentication)
        ));
    }

    #[tokio::test]
    async fn truncated_blob_is_malformed() {
        let custody = LocalKeyCustody::new();
        assert!(matches!(
            custody.decrypt(&[0u8; 5], &kek(7)).await,
            Err(CustodyError::Malformed(_))
        ));
    }

    #[test]
    fn kek_from_hex() {
        let hex = "11".repeat(32);
        assert!(KeyEncryptionKey::from_hex(&hex).is_ok());
        assert!(KeyEncryptionKey::from_hex(&format!("0x{hex}")).is_ok());
        assert!(KeyEncryptionKey::from_hex("abcd").is_err());
        assert!(KeyEncryptionKey::from_hex("zz").is_err());
        assert_eq!(format!("{:?}", kek(1)), "KeyEncryptionKey(<redacted>)");
    }
}
