// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session-gated signing entry point.
//!
//! Every signing call runs the same pipeline and stops at the first failure:
//!
//! 1. rate limiter (before any session or nonce work)
//! 2. session validation, including ownership by the calling account
//! 3. payload validation
//! 4. nonce consumption, for transaction-bearing operations only
//! 5. key decryption through the custody collaborator
//! 6. the cryptographic primitive
//! 7. broadcast, for `send_transaction`
//! 8. one audit entry carrying the outcome returned to the caller
//!
//! Steps 5 to 7 share one deadline. Key material lives only inside a single
//! call and is zeroized when the signer drops.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use alloy::{
    primitives::{Address, Signature, B256},
    signers::local::PrivateKeySigner,
};
use tokio::time::{timeout_at, Instant};

use super::account::{load_account, IdentityStore};
use super::audit::{AuditAction, AuditEntry, AuditLogger, AuditSink};
use super::clock::Clock;
use super::credentials::{ClientInfo, CredentialVerifier};
use super::error::{WalletError, WalletResult};
use super::locks::AccountLocks;
use super::nonce::NonceSequencer;
use super::rate_limit::{CounterStore, RateLimiter};
use super::session::{IssuedSession, SessionRepository, SessionStore, SessionToken};
use crate::blockchain::{
    signing::{self, SignedEnvelope},
    types::parse_hash,
    Broadcaster, ChainConfig, ChainError, SentTransaction, SignatureResult, SignedTransaction,
    UnsignedTransaction,
};
use crate::config::SecurityPolicy;
use crate::custody::{KeyCustody, KeyEncryptionKey};

/// Who is asking, from where, and how long they are willing to wait.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Account resolved from the identity credential, not from the session.
    pub account_id: String,
    pub client: ClientInfo,
    /// Overrides the policy's signing timeout when set.
    pub timeout: Option<StdDuration>,
}

impl RequestContext {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            client: ClientInfo::default(),
            timeout: None,
        }
    }

    pub fn with_client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Storage and collaborator handles the gateway is assembled from.
pub struct GatewayBackends {
    pub identity: Arc<dyn IdentityStore>,
    pub sessions: Arc<dyn SessionRepository>,
    pub audit: Arc<dyn AuditSink>,
    pub counters: Arc<dyn CounterStore>,
    pub custody: Arc<dyn KeyCustody>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub clock: Arc<dyn Clock>,
}

/// Counts from one expiry sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub rate_windows: usize,
    pub idle_locks: usize,
}

pub struct SigningGateway {
    identity: Arc<dyn IdentityStore>,
    verifier: CredentialVerifier,
    sessions: Arc<SessionStore>,
    nonces: NonceSequencer,
    limiter: RateLimiter,
    audit: AuditLogger,
    locks: Arc<AccountLocks>,
    custody: Arc<dyn KeyCustody>,
    kek: KeyEncryptionKey,
    broadcaster: Arc<dyn Broadcaster>,
    chain: ChainConfig,
    policy: SecurityPolicy,
}

impl SigningGateway {
    pub fn new(
        backends: GatewayBackends,
        kek: KeyEncryptionKey,
        chain: ChainConfig,
        policy: SecurityPolicy,
    ) -> Self {
        let GatewayBackends {
            identity,
            sessions,
            audit,
            counters,
            custody,
            broadcaster,
            clock,
        } = backends;

        let locks = Arc::new(AccountLocks::new());
        let audit = AuditLogger::new(audit, clock.clone());
        let sessions = Arc::new(SessionStore::new(sessions, clock.clone(), policy.session_ttl));
        let verifier = CredentialVerifier::new(
            identity.clone(),
            locks.clone(),
            sessions.clone(),
            audit.clone(),
            clock.clone(),
            policy.clone(),
        );
        let nonces = NonceSequencer::new(identity.clone(), locks.clone());
        let limiter = RateLimiter::new(
            counters,
            clock,
            policy.rate_limit_max,
            policy.rate_limit_window,
        );

        Self {
            identity,
            verifier,
            sessions,
            nonces,
            limiter,
            audit,
            locks,
            custody,
            kek,
            broadcaster,
            chain,
            policy,
        }
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Check the wallet password and open a session.
    pub async fn create_session(
        &self,
        account_id: &str,
        password: &str,
        client: ClientInfo,
    ) -> WalletResult<IssuedSession> {
        self.verifier
            .verify_credentials(account_id, password, client)
            .await
    }

    /// Revoke the caller's own session.
    pub fn revoke_session(&self, ctx: &RequestContext, token: &SessionToken) -> WalletResult<()> {
        let entry = self.entry(ctx, AuditAction::SessionRevoked);
        let result = self
            .sessions
            .revoke_owned(token, &ctx.account_id)
            .map(|_| ());
        self.finish(entry, result)
    }

    /// Revoke every session of the calling account. Returns how many ended.
    pub fn revoke_all_sessions(&self, ctx: &RequestContext) -> WalletResult<usize> {
        let entry = self.entry(ctx, AuditAction::AllSessionsRevoked);
        let result = self.sessions.revoke_all(&ctx.account_id);
        self.finish(entry, result)
    }

    // =========================================================================
    // Account state
    // =========================================================================

    pub fn peek_nonce(&self, account_id: &str) -> WalletResult<u64> {
        self.nonces.peek(account_id)
    }

    pub fn get_audit_log(&self, account_id: &str, limit: usize) -> WalletResult<Vec<AuditEntry>> {
        self.audit.query(account_id, limit)
    }

    /// Drop expired sessions and rate windows, and idle account locks.
    pub fn sweep_expired(&self) -> WalletResult<SweepReport> {
        Ok(SweepReport {
            sessions: self.sessions.purge_expired()?,
            rate_windows: self.limiter.purge_expired()?,
            idle_locks: self.locks.prune_idle(),
        })
    }

    // =========================================================================
    // Signing operations
    // =========================================================================

    /// EIP-191 personal message signature. No nonce.
    pub async fn personal_sign(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
        message: &str,
    ) -> WalletResult<SignatureResult> {
        let entry = self.admit(ctx, AuditAction::PersonalSign)?;
        let result: WalletResult<SignatureResult> = async {
            self.authorize(ctx, token)?;
            if message.is_empty() {
                return Err(WalletError::validation("message must not be empty"));
            }
            let bytes = signing::message_bytes(message);

            let deadline = self.deadline(ctx);
            let signer = self.unlock_signer(ctx, entry.action, None, deadline).await?;
            let address = signer.address();
            let (digest, signature) = self
                .sign_blocking(ctx, entry.action, None, deadline, move || {
                    signing::sign_personal_message(&signer, &bytes)
                })
                .await?;
            Ok(signature_result(&signature, digest, address))
        }
        .await;
        self.finish(entry, result)
    }

    /// Sign an EIP-1559 transaction, consuming its nonce. Not broadcast.
    pub async fn sign_transaction(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
        tx: &UnsignedTransaction,
    ) -> WalletResult<SignedTransaction> {
        let mut entry = self.admit(ctx, AuditAction::SignTransaction)?;
        let result: WalletResult<SignedTransaction> = async {
            let signed = self.sign_prepared(ctx, token, tx, &mut entry, false).await?;
            Ok(SignedTransaction {
                raw_transaction: alloy::hex::encode_prefixed(&signed.envelope.raw),
                tx_hash: signed.envelope.tx_hash.to_string(),
                nonce: signed.nonce,
                from: signed.from.to_string(),
            })
        }
        .await;
        self.finish(entry, result)
    }

    /// Sign and broadcast an EIP-1559 transaction, consuming its nonce.
    ///
    /// A broadcast that outlives the deadline is reported as
    /// [`WalletError::OutcomeUncertain`]; the nonce stays consumed.
    pub async fn send_transaction(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
        tx: &UnsignedTransaction,
    ) -> WalletResult<SentTransaction> {
        let mut entry = self.admit(ctx, AuditAction::SendTransaction)?;
        let result: WalletResult<SentTransaction> = async {
            let signed = self.sign_prepared(ctx, token, tx, &mut entry, true).await?;
            let local_hash = signed.envelope.tx_hash.to_string();

            let broadcast = self.broadcaster.broadcast(&signed.envelope);
            let tx_hash = match timeout_at(signed.deadline, broadcast).await {
                Err(_) => {
                    tracing::error!(
                        account_id = %ctx.account_id,
                        nonce = signed.nonce,
                        tx_hash = %local_hash,
                        "Broadcast timed out; transaction may be in flight"
                    );
                    return Err(WalletError::OutcomeUncertain {
                        account_id: ctx.account_id.clone(),
                        nonce: signed.nonce,
                        tx_hash: local_hash,
                    });
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        account_id = %ctx.account_id,
                        nonce = signed.nonce,
                        tx_hash = %local_hash,
                        error = %e,
                        "Broadcast failed"
                    );
                    return Err(WalletError::BroadcastFailed {
                        account_id: ctx.account_id.clone(),
                        nonce: signed.nonce,
                        tx_hash: local_hash,
                        reason: e.to_string(),
                    });
                }
                Ok(Ok(tx_hash)) => tx_hash,
            };

            tracing::info!(
                account_id = %ctx.account_id,
                nonce = signed.nonce,
                tx_hash = %tx_hash,
                chain_id = self.chain.chain_id,
                "Transaction broadcast"
            );
            entry.tx_hash = Some(tx_hash.clone());
            Ok(SentTransaction {
                tx_hash,
                nonce: signed.nonce,
                from: signed.from.to_string(),
            })
        }
        .await;
        self.finish(entry, result)
    }

    /// EIP-712 typed data signature. No nonce.
    pub async fn sign_typed_data(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
        typed_data: &serde_json::Value,
    ) -> WalletResult<SignatureResult> {
        let entry = self.admit(ctx, AuditAction::SignTypedData)?;
        let result: WalletResult<SignatureResult> = async {
            self.authorize(ctx, token)?;
            let typed: alloy::dyn_abi::TypedData = serde_json::from_value(typed_data.clone())
                .map_err(|e| WalletError::validation(format!("Invalid typed data: {e}")))?;
            let hash = signing::typed_data_hash(&typed).map_err(invalid_payload)?;

            self.sign_digest(ctx, entry.action, hash).await
        }
        .await;
        self.finish(entry, result)
    }

    /// Sign a caller-supplied 32-byte digest as is. No nonce.
    pub async fn raw_hash_sign(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
        hash: &str,
    ) -> WalletResult<SignatureResult> {
        let entry = self.admit(ctx, AuditAction::RawHashSign)?;
        let result: WalletResult<SignatureResult> = async {
            self.authorize(ctx, token)?;
            let hash = parse_hash(hash).map_err(invalid_payload)?;

            self.sign_digest(ctx, entry.action, hash).await
        }
        .await;
        self.finish(entry, result)
    }

    // =========================================================================
    // Pipeline steps
    // =========================================================================

    fn entry(&self, ctx: &RequestContext, action: AuditAction) -> AuditEntry {
        self.audit
            .entry(&ctx.account_id, action)
            .with_client(ctx.client.client_ip.clone(), ctx.client.user_agent.clone())
    }

    /// Rate limit check. Rejections are not audited.
    fn admit(&self, ctx: &RequestContext, action: AuditAction) -> WalletResult<AuditEntry> {
        if !self.limiter.allow(&ctx.account_id) {
            tracing::warn!(account_id = %ctx.account_id, %action, "Signing request rate limited");
            return Err(WalletError::RateLimitExceeded);
        }
        Ok(self.entry(ctx, action))
    }

    fn authorize(&self, ctx: &RequestContext, token: &SessionToken) -> WalletResult<()> {
        self.sessions.validate_owned(token, &ctx.account_id)?;
        Ok(())
    }

    fn deadline(&self, ctx: &RequestContext) -> Instant {
        Instant::now() + ctx.timeout.unwrap_or(self.policy.signing_timeout)
    }

    fn finish<T>(&self, entry: AuditEntry, result: WalletResult<T>) -> WalletResult<T> {
        match &result {
            Ok(_) => self.audit.append(entry),
            Err(e) => self.audit.append(entry.failed(e)),
        }
        result
    }

    /// Validate, consume the nonce, decrypt and sign.
    async fn sign_prepared(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
        tx: &UnsignedTransaction,
        entry: &mut AuditEntry,
        broadcasting: bool,
    ) -> WalletResult<PreparedSignature> {
        let action = entry.action;
        self.authorize(ctx, token)?;

        let prepared = tx.prepare(self.chain.chain_id).map_err(invalid_payload)?;
        if broadcasting && prepared.tx.chain_id != self.chain.chain_id {
            return Err(WalletError::validation(format!(
                "chain_id {} does not match the configured network ({})",
                prepared.tx.chain_id, self.chain.chain_id
            )));
        }
        let nonce = prepared.tx.nonce;
        entry.nonce = Some(nonce);
        entry.amount = Some(prepared.value.to_string());
        entry.recipient = Some(prepared.recipient.to_string());

        self.nonces
            .validate_and_advance(&ctx.account_id, nonce)
            .await?;

        let deadline = self.deadline(ctx);
        let signer = self
            .unlock_signer(ctx, action, Some(nonce), deadline)
            .await?;
        let from = signer.address();
        let body = prepared.tx;
        let envelope = self
            .sign_blocking(ctx, action, Some(nonce), deadline, move || {
                signing::sign_transaction(&signer, body)
            })
            .await?;
        entry.tx_hash = Some(envelope.tx_hash.to_string());

        tracing::info!(
            account_id = %ctx.account_id,
            %action,
            nonce,
            tx_hash = %envelope.tx_hash,
            "Transaction signed"
        );

        Ok(PreparedSignature {
            envelope,
            from,
            nonce,
            deadline,
        })
    }

    async fn sign_digest(
        &self,
        ctx: &RequestContext,
        action: AuditAction,
        hash: B256,
    ) -> WalletResult<SignatureResult> {
        let deadline = self.deadline(ctx);
        let signer = self.unlock_signer(ctx, action, None, deadline).await?;
        let address = signer.address();
        let signature = self
            .sign_blocking(ctx, action, None, deadline, move || {
                signing::sign_raw_hash(&signer, &hash)
            })
            .await?;
        Ok(signature_result(&signature, hash, address))
    }

    async fn unlock_signer(
        &self,
        ctx: &RequestContext,
        action: AuditAction,
        nonce: Option<u64>,
        deadline: Instant,
    ) -> WalletResult<PrivateKeySigner> {
        let account = load_account(self.identity.as_ref(), &ctx.account_id)?;

        let decrypt = self.custody.decrypt(account.encrypted_key(), &self.kek);
        let material = match timeout_at(deadline, decrypt).await {
            Err(_) => return Err(self.timed_out(ctx, action, nonce, "key_decryption")),
            Ok(Err(e)) => return Err(self.decryption_failed(ctx, action, nonce, e.to_string())),
            Ok(Ok(material)) => material,
        };

        signing::signer_from_key_material(&material)
            .map_err(|e| self.decryption_failed(ctx, action, nonce, e.to_string()))
    }

    async fn sign_blocking<T, F>(
        &self,
        ctx: &RequestContext,
        action: AuditAction,
        nonce: Option<u64>,
        deadline: Instant,
        op: F,
    ) -> WalletResult<T>
    where
        F: FnOnce() -> Result<T, ChainError> + Send + 'static,
        T: Send + 'static,
    {
        match timeout_at(deadline, tokio::task::spawn_blocking(op)).await {
            Err(_) => Err(self.timed_out(ctx, action, nonce, "signing")),
            Ok(Err(e)) => Err(WalletError::Internal(format!("Signing task aborted: {e}"))),
            Ok(Ok(Err(e))) => {
                tracing::error!(account_id = %ctx.account_id, %action, ?nonce, error = %e, "Signing failed");
                Err(WalletError::SigningFailed {
                    account_id: ctx.account_id.clone(),
                    action,
                    nonce,
                    reason: e.to_string(),
                })
            }
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }

    fn decryption_failed(
        &self,
        ctx: &RequestContext,
        action: AuditAction,
        nonce: Option<u64>,
        reason: String,
    ) -> WalletError {
        tracing::error!(account_id = %ctx.account_id, %action, ?nonce, reason = %reason, "Key decryption failed");
        WalletError::KeyDecryptionFailed {
            account_id: ctx.account_id.clone(),
            action,
            nonce,
            reason,
        }
    }

    fn timed_out(
        &self,
        ctx: &RequestContext,
        action: AuditAction,
        nonce: Option<u64>,
        stage: &'static str,
    ) -> WalletError {
        tracing::warn!(account_id = %ctx.account_id, %action, ?nonce, stage, "Signing deadline exceeded");
        WalletError::Timeout {
            account_id: ctx.account_id.clone(),
            action,
            nonce,
            stage,
        }
    }
}

struct PreparedSignature {
    envelope: SignedEnvelope,
    from: Address,
    nonce: u64,
    deadline: Instant,
}

fn invalid_payload(e: ChainError) -> WalletError {
    WalletError::validation(e.to_string())
}

fn signature_result(signature: &Signature, digest: B256, address: Address) -> SignatureResult {
    SignatureResult {
        signature: signing::signature_hex(signature),
        signed_hash: digest.to_string(),
        address: address.to_string(),
    }
}
