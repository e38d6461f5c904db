// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::security::WalletError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
}

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable description
    pub error: String,
    /// Stable machine-readable code
    pub error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            message: message.into(),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        let code = err.error_code();
        let status = match &err {
            WalletError::InvalidCredentials
            | WalletError::SessionNotFound
            | WalletError::SessionExpired => StatusCode::UNAUTHORIZED,
            WalletError::AccountLocked { .. } => StatusCode::LOCKED,
            WalletError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            WalletError::NonceMismatch { .. } => StatusCode::CONFLICT,
            WalletError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            WalletError::ValidationError(_) => StatusCode::BAD_REQUEST,
            WalletError::BroadcastFailed { .. } => StatusCode::BAD_GATEWAY,
            WalletError::OutcomeUncertain { .. } | WalletError::Timeout { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
            WalletError::KeyDecryptionFailed { .. }
            | WalletError::SigningFailed { .. }
            | WalletError::Storage(_)
            | WalletError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Custody, storage and signer internals stay in the logs.
        let message = match &err {
            WalletError::KeyDecryptionFailed { .. } => "Key decryption failed".to_string(),
            WalletError::SigningFailed { .. } => "Signing failed".to_string(),
            WalletError::Storage(_) | WalletError::Internal(_) => {
                tracing::error!(error = %err, "Internal error while serving request");
                "Internal server error".to_string()
            }
            _ => err.to_string(),
        };

        Self::new(status, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::AuditAction;
    use crate::storage::StorageError;
    use axum::body::to_bytes;

    #[test]
    fn wallet_errors_map_to_statuses() {
        let cases = [
            (WalletError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (WalletError::SessionExpired, StatusCode::UNAUTHORIZED),
            (
                WalletError::AccountLocked {
                    until: chrono::Utc::now(),
                },
                StatusCode::LOCKED,
            ),
            (
                WalletError::NonceMismatch { expected: 1, got: 0 },
                StatusCode::CONFLICT,
            ),
            (WalletError::RateLimitExceeded, StatusCode::TOO_MANY_REQUESTS),
            (
                WalletError::ValidationError("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                WalletError::OutcomeUncertain {
                    account_id: "a".into(),
                    nonce: 0,
                    tx_hash: "0x00".into(),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                WalletError::BroadcastFailed {
                    account_id: "a".into(),
                    nonce: 0,
                    tx_hash: "0x00".into(),
                    reason: "rpc down".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn internals_are_not_exposed() {
        let err = ApiError::from(WalletError::KeyDecryptionFailed {
            account_id: "a".into(),
            action: AuditAction::PersonalSign,
            nonce: None,
            reason: "authentication tag mismatch".into(),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code, "key_decryption_failed");
        assert!(!err.message.contains("tag"));

        let err = ApiError::from(WalletError::Storage(StorageError::Backend(
            "disk on fire".into(),
        )));
        assert_eq!(err.message, "Internal server error");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::from(WalletError::NonceMismatch { expected: 2, got: 1 })
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "nonce_mismatch");
        assert_eq!(body["error"], "nonce mismatch: expected 2, got 1");
    }
}
