// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session-gated signing endpoints.
//!
//! Every route needs both the identity bearer token and an
//! `X-Wallet-Session` header. `X-Signing-Timeout-Ms` may shorten the
//! server-side deadline.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use super::{request_context, Client};
use crate::{
    auth::{Identity, WalletSession},
    blockchain::{SentTransaction, SignatureResult, SignedTransaction, UnsignedTransaction},
    error::{ApiError, ErrorBody},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PersonalSignRequest {
    /// UTF-8 text, or `0x`-prefixed hex for raw bytes.
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RawHashSignRequest {
    /// 32-byte digest, `0x`-prefixed hex.
    pub hash: String,
}

#[utoipa::path(
    post,
    path = "/v1/wallet/sign/personal",
    tag = "Signing",
    security(("bearer_auth" = [], "wallet_session" = [])),
    request_body = PersonalSignRequest,
    responses(
        (status = 200, description = "EIP-191 signature", body = SignatureResult),
        (status = 401, description = "Missing or invalid session", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    )
)]
pub async fn personal_sign(
    State(state): State<AppState>,
    Identity(account): Identity,
    WalletSession(token): WalletSession,
    Client(client): Client,
    headers: HeaderMap,
    Json(request): Json<PersonalSignRequest>,
) -> Result<Json<SignatureResult>, ApiError> {
    let ctx = request_context(&state, &account, client, &headers);
    let result = state
        .gateway
        .personal_sign(&ctx, &token, &request.message)
        .await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/v1/wallet/sign/transaction",
    tag = "Signing",
    security(("bearer_auth" = [], "wallet_session" = [])),
    request_body = UnsignedTransaction,
    responses(
        (status = 200, description = "Signed, not broadcast", body = SignedTransaction),
        (status = 409, description = "Nonce does not match", body = ErrorBody)
    )
)]
pub async fn sign_transaction(
    State(state): State<AppState>,
    Identity(account): Identity,
    WalletSession(token): WalletSession,
    Client(client): Client,
    headers: HeaderMap,
    Json(tx): Json<UnsignedTransaction>,
) -> Result<Json<SignedTransaction>, ApiError> {
    let ctx = request_context(&state, &account, client, &headers);
    let signed = state.gateway.sign_transaction(&ctx, &token, &tx).await?;
    Ok(Json(signed))
}

#[utoipa::path(
    post,
    path = "/v1/wallet/send",
    tag = "Signing",
    security(("bearer_auth" = [], "wallet_session" = [])),
    request_body = UnsignedTransaction,
    responses(
        (status = 200, description = "Broadcast accepted", body = SentTransaction),
        (status = 409, description = "Nonce does not match", body = ErrorBody),
        (status = 502, description = "Node rejected the transaction", body = ErrorBody),
        (status = 504, description = "Outcome unknown; do not reuse the nonce", body = ErrorBody)
    )
)]
pub async fn send_transaction(
    State(state): State<AppState>,
    Identity(account): Identity,
    WalletSession(token): WalletSession,
    Client(client): Client,
    headers: HeaderMap,
    Json(tx): Json<UnsignedTransaction>,
) -> Result<Json<SentTransaction>, ApiError> {
    let ctx = request_context(&state, &account, client, &headers);
    let sent = state.gateway.send_transaction(&ctx, &token, &tx).await?;
    Ok(Json(sent))
}

#[utoipa::path(
    post,
    path = "/v1/wallet/sign/typed-data",
    tag = "Signing",
    security(("bearer_auth" = [], "wallet_session" = [])),
    request_body(content = Object, description = "EIP-712 typed data document"),
    responses(
        (status = 200, description = "EIP-712 signature", body = SignatureResult),
        (status = 400, description = "Malformed typed data", body = ErrorBody)
    )
)]
pub async fn sign_typed_data(
    State(state): State<AppState>,
    Identity(account): Identity,
    WalletSession(token): WalletSession,
    Client(client): Client,
    headers: HeaderMap,
    Json(typed_data): Json<serde_json::Value>,
) -> Result<Json<SignatureResult>, ApiError> {
    let ctx = request_context(&state, &account, client, &headers);
    let result = state
        .gateway
        .sign_typed_data(&ctx, &token, &typed_data)
        .await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/v1/wallet/sign/hash",
    tag = "Signing",
    security(("bearer_auth" = [], "wallet_session" = [])),
    request_body = RawHashSignRequest,
    responses(
        (status = 200, description = "Signature over the digest", body = SignatureResult),
        (status = 400, description = "Not a 32-byte hex digest", body = ErrorBody)
    )
)]
pub async fn raw_hash_sign(
    State(state): State<AppState>,
    Identity(account): Identity,
    WalletSession(token): WalletSession,
    Client(client): Client,
    headers: HeaderMap,
    Json(request): Json<RawHashSignRequest>,
) -> Result<Json<SignatureResult>, ApiError> {
    let ctx = request_context(&state, &account, client, &headers);
    let result = state
        .gateway
        .raw_hash_sign(&ctx, &token, &request.hash)
        .await?;
    Ok(Json(result))
}
