// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the two credentials a wallet request carries.
//!
//! ```rust,ignore
//! async fn my_handler(
//!     Identity(account): Identity,
//!     WalletSession(token): WalletSession,
//! ) -> impl IntoResponse {
//!     // account.account_id comes from the bearer token,
//!     // token is the wallet session credential
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedAccount, WALLET_SESSION_HEADER};
use crate::security::SessionToken;
use crate::state::AppState;

/// Longest accepted session header value.
const MAX_SESSION_TOKEN_LEN: usize = 128;

/// Caller identity from `Authorization: Bearer <jwt>`.
pub struct Identity(pub AuthenticatedAccount);

impl FromRequestParts<AppState> for Identity {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let account = state.identity.verify(token)?;
        Ok(Identity(account))
    }
}

/// Wallet session token from the `X-Wallet-Session` header.
pub struct WalletSession(pub SessionToken);

impl<S> FromRequestParts<S> for WalletSession
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(WALLET_SESSION_HEADER)
            .ok_or(AuthError::MissingSessionHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidSessionHeader)?
            .trim();

        if value.is_empty()
            || value.len() > MAX_SESSION_TOKEN_LEN
            || !value.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(AuthError::InvalidSessionHeader);
        }

        Ok(WalletSession(SessionToken::new(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::test_tokens;
    use crate::state::test_app;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/test");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn identity_requires_auth_header() {
        let state = test_app().state;
        let mut parts = parts(&[]);
        let result = Identity::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn identity_rejects_non_bearer() {
        let state = test_app().state;
        let mut parts = parts(&[("Authorization", "Basic abc")]);
        let result = Identity::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn identity_succeeds_with_signed_jwt() {
        let state = test_app().state;
        let bearer = format!("Bearer {}", test_tokens::valid("acct_1"));
        let mut parts = parts(&[("Authorization", bearer.as_str())]);
        let Identity(account) = Identity::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(account.account_id, "acct_1");
    }

    #[tokio::test]
    async fn session_header_is_required_and_checked() {
        let mut missing = parts(&[]);
        assert!(matches!(
            WalletSession::from_request_parts(&mut missing, &()).await,
            Err(AuthError::MissingSessionHeader)
        ));

        let mut bad = parts(&[(WALLET_SESSION_HEADER, "not hex!")]);
        assert!(matches!(
            WalletSession::from_request_parts(&mut bad, &()).await,
            Err(AuthError::InvalidSessionHeader)
        ));

        let token = "ab".repeat(32);
        let mut good = parts(&[(WALLET_SESSION_HEADER, token.as_str())]);
        let WalletSession(session) = WalletSession::from_request_parts(&mut good, &())
            .await
            .unwrap();
        assert_eq!(session.expose(), token);
    }
}
