// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::Identity,
    error::{ApiError, ErrorBody},
    security::AuditEntry,
    state::AppState,
};

const DEFAULT_AUDIT_LIMIT: usize = 50;

#[derive(Debug, Serialize, ToSchema)]
pub struct NonceResponse {
    /// Nonce the next transaction must carry.
    pub nonce: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Page size, 1 to 100. Defaults to 50.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Newest first.
    pub entries: Vec<AuditEntry>,
}

#[utoipa::path(
    get,
    path = "/v1/wallet/nonce",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Next expected nonce", body = NonceResponse),
        (status = 404, description = "Unknown account", body = ErrorBody)
    )
)]
pub async fn get_nonce(
    State(state): State<AppState>,
    Identity(account): Identity,
) -> Result<Json<NonceResponse>, ApiError> {
    let nonce = state.gateway.peek_nonce(&account.account_id)?;
    Ok(Json(NonceResponse { nonce }))
}

#[utoipa::path(
    get,
    path = "/v1/wallet/audit",
    tag = "Account",
    security(("bearer_auth" = [])),
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = AuditLogResponse),
        (status = 400, description = "Limit out of range", body = ErrorBody)
    )
)]
pub async fn get_audit_log(
    State(state): State<AppState>,
    Identity(account): Identity,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    let entries = state.gateway.get_audit_log(&account.account_id, limit)?;
    Ok(Json(AuditLogResponse { entries }))
}
