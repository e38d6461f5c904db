// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{request_context, Client};
use crate::{
    auth::{Identity, WalletSession},
    error::{ApiError, ErrorBody},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    /// Wallet password of the authenticated account.
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: String,
    /// Opaque session token. Send it back in `X-Wallet-Session`.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeAllResponse {
    pub revoked: usize,
}

#[utoipa::path(
    post,
    path = "/v1/wallet/sessions",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session opened", body = CreateSessionResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 423, description = "Account locked", body = ErrorBody)
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    Identity(account): Identity,
    Client(client): Client,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let issued = state
        .gateway
        .create_session(&account.account_id, &request.password, client)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: issued.session.session_id,
            token: issued.token.expose().to_string(),
            expires_at: issued.session.expires_at,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/v1/wallet/sessions",
    tag = "Sessions",
    security(("bearer_auth" = [], "wallet_session" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Unknown session", body = ErrorBody)
    )
)]
pub async fn revoke_session(
    State(state): State<AppState>,
    Identity(account): Identity,
    WalletSession(token): WalletSession,
    Client(client): Client,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let ctx = request_context(&state, &account, client, &headers);
    state.gateway.revoke_session(&ctx, &token)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/wallet/sessions/all",
    tag = "Sessions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All sessions revoked", body = RevokeAllResponse)
    )
)]
pub async fn revoke_all_sessions(
    State(state): State<AppState>,
    Identity(account): Identity,
    Client(client): Client,
    headers: HeaderMap,
) -> Result<Json<RevokeAllResponse>, ApiError> {
    let ctx = request_context(&state, &account, client, &headers);
    let revoked = state.gateway.revoke_all_sessions(&ctx)?;
    Ok(Json(RevokeAllResponse { revoked }))
}
