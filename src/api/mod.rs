// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{convert::Infallible, net::SocketAddr, time::Duration};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, HeaderMap},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::AuthenticatedAccount,
    blockchain::{SentTransaction, SignatureResult, SignedTransaction, UnsignedTransaction},
    error::ErrorBody,
    security::{AuditAction, AuditEntry, AuditOutcome, ClientInfo, RequestContext},
    state::AppState,
};

pub mod accounts;
pub mod health;
pub mod sessions;
pub mod signing;

/// Optional per-request deadline, in milliseconds.
pub const SIGNING_TIMEOUT_HEADER: &str = "x-signing-timeout-ms";

pub fn router(state: AppState) -> Router {
    let wallet_routes = Router::new()
        .route(
            "/sessions",
            post(sessions::create_session).delete(sessions::revoke_session),
        )
        .route("/sessions/all", delete(sessions::revoke_all_sessions))
        .route("/nonce", get(accounts::get_nonce))
        .route("/audit", get(accounts::get_audit_log))
        .route("/sign/personal", post(signing::personal_sign))
        .route("/sign/transaction", post(signing::sign_transaction))
        .route("/send", post(signing::send_transaction))
        .route("/sign/typed-data", post(signing::sign_typed_data))
        .route("/sign/hash", post(signing::raw_hash_sign));

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .nest("/v1/wallet", wallet_routes)
        .with_state(state);

    app.merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Client metadata recorded on sessions and audit entries.
///
/// Forwarding headers are honoured only when the deployment trusts its proxy.
/// Otherwise the socket peer address is used.
pub struct Client(pub ClientInfo);

impl FromRequestParts<AppState> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Client(client_info(
            &parts.headers,
            peer,
            state.trust_proxy_headers,
        )))
    }
}

/// Build the gateway context for an authenticated request.
///
/// The client may shorten the signing deadline but never extend it.
pub(crate) fn request_context(
    state: &AppState,
    account: &AuthenticatedAccount,
    client: ClientInfo,
    headers: &HeaderMap,
) -> RequestContext {
    let max_timeout = state.gateway.policy().signing_timeout;
    let ctx = RequestContext::new(account.account_id.clone()).with_client(client);

    match headers
        .get(SIGNING_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
    {
        Some(ms) => ctx.with_timeout(Duration::from_millis(ms).min(max_timeout)),
        None => ctx,
    }
}

pub(crate) fn client_info(
    headers: &HeaderMap,
    peer: Option<String>,
    trust_proxy_headers: bool,
) -> ClientInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let forwarded = || {
        header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| header("x-real-ip").map(str::to_string))
    };
    let client_ip = if trust_proxy_headers {
        forwarded().or(peer)
    } else {
        peer
    };
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ClientInfo {
        client_ip,
        user_agent,
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "wallet_session",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Wallet-Session"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        sessions::create_session,
        sessions::revoke_session,
        sessions::revoke_all_sessions,
        accounts::get_nonce,
        accounts::get_audit_log,
        signing::personal_sign,
        signing::sign_transaction,
        signing::send_transaction,
        signing::sign_typed_data,
        signing::raw_hash_sign
    ),
    components(
        schemas(
            ErrorBody,
            AuditAction,
            AuditOutcome,
            AuditEntry,
            UnsignedTransaction,
            SignedTransaction,
            SentTransaction,
            SignatureResult,
            sessions::CreateSessionRequest,
            sessions::CreateSessionResponse,
            sessions::RevokeAllResponse,
            accounts::NonceResponse,
            accounts::AuditLogResponse,
            signing::PersonalSignRequest,
            signing::RawHashSignRequest,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Sessions", description = "Wallet session lifecycle"),
        (name = "Account", description = "Nonce and audit trail"),
        (name = "Signing", description = "Session-gated signing operations")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::test_tokens;
    use crate::state::{test_app, TEST_ACCOUNT, TEST_PASSWORD};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        session: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                "Authorization",
                format!("Bearer {}", test_tokens::valid(TEST_ACCOUNT)),
            )
            .header("content-type", "application/json");
        if let Some(token) = session {
            builder = builder.header("X-Wallet-Session", token);
        }
        let body = match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn login(app: &Router) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/v1/wallet/sessions",
            None,
            Some(serde_json::json!({ "password": TEST_PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    fn tx(nonce: u64) -> serde_json::Value {
        serde_json::json!({
            "to": "0x2222222222222222222222222222222222222222",
            "value": "1000",
            "nonce": nonce,
            "gas_limit": 21000,
            "max_fee_per_gas": "30000000000",
            "max_priority_fee_per_gas": "1500000000"
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = router(test_app().state);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn wallet_routes_require_bearer() {
        let app = router(test_app().state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/wallet/nonce")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_is_401() {
        let app = router(test_app().state);
        let (status, body) = call(
            &app,
            "POST",
            "/v1/wallet/sessions",
            None,
            Some(serde_json::json!({ "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn sign_transaction_flow_over_http() {
        let app = router(test_app().state);
        let token = login(&app).await;

        let (status, body) = call(&app, "GET", "/v1/wallet/nonce", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nonce"], 0);

        let (status, body) = call(
            &app,
            "POST",
            "/v1/wallet/sign/transaction",
            Some(&token),
            Some(tx(0)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nonce"], 0);
        assert!(body["raw_transaction"].as_str().unwrap().starts_with("0x02"));

        let (status, body) = call(
            &app,
            "POST",
            "/v1/wallet/sign/transaction",
            Some(&token),
            Some(tx(0)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error_code"], "nonce_mismatch");

        let (status, body) = call(&app, "GET", "/v1/wallet/audit?limit=10", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"][0]["outcome"], "error");
        assert_eq!(body["entries"][1]["action"], "sign_transaction");
    }

    #[tokio::test]
    async fn signing_requires_session_header() {
        let app = router(test_app().state);
        let (status, body) = call(
            &app,
            "POST",
            "/v1/wallet/sign/personal",
            None,
            Some(serde_json::json!({ "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_session_header");
    }

    #[tokio::test]
    async fn send_and_revoke_over_http() {
        let app = router(test_app().state);
        let token = login(&app).await;

        let (status, body) =
            call(&app, "POST", "/v1/wallet/send", Some(&token), Some(tx(0))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["tx_hash"].as_str().unwrap().starts_with("0x"));

        let (status, _) = call(&app, "DELETE", "/v1/wallet/sessions", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(
            &app,
            "POST",
            "/v1/wallet/sign/hash",
            Some(&token),
            Some(serde_json::json!({ "hash": format!("0x{}", "42".repeat(32)) })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "session_not_found");
    }

    #[tokio::test]
    async fn audit_limit_is_bounded() {
        let app = router(test_app().state);
        let (status, body) = call(&app, "GET", "/v1/wallet/audit?limit=500", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "validation_error");
    }

    #[test]
    fn timeout_header_only_shortens_deadline() {
        let account = AuthenticatedAccount {
            account_id: "acct".into(),
            expires_at: 0,
        };
        let state = test_app().state;
        let max = state.gateway.policy().signing_timeout;
        let context = |headers: &HeaderMap| {
            request_context(&state, &account, ClientInfo::default(), headers).timeout
        };

        let mut headers = HeaderMap::new();
        headers.insert(SIGNING_TIMEOUT_HEADER, "250".parse().unwrap());
        assert_eq!(context(&headers), Some(Duration::from_millis(250)));

        headers.insert(SIGNING_TIMEOUT_HEADER, "600000".parse().unwrap());
        assert_eq!(context(&headers), Some(max));

        assert_eq!(context(&HeaderMap::new()), None);
    }

    fn forwarded_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        headers.insert(USER_AGENT, "curl/8".parse().unwrap());
        headers
    }

    #[test]
    fn forwarding_headers_are_ignored_unless_trusted() {
        let peer = Some("198.51.100.7".to_string());

        let info = client_info(&forwarded_headers(), peer.clone(), false);
        assert_eq!(info.client_ip.as_deref(), Some("198.51.100.7"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8"));

        let info = client_info(&forwarded_headers(), None, false);
        assert_eq!(info.client_ip, None);
    }

    #[test]
    fn trusted_proxy_uses_first_forwarded_hop() {
        let info = client_info(&forwarded_headers(), Some("10.0.0.1".to_string()), true);
        assert_eq!(info.client_ip.as_deref(), Some("203.0.113.9"));

        let info = client_info(&HeaderMap::new(), Some("10.0.0.1".to_string()), true);
        assert_eq!(info.client_ip.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn spoofed_forwarded_for_does_not_reach_audit_trail() {
        let app = router(test_app().state);
        let request = Request::builder()
            .method("POST")
            .uri("/v1/wallet/sessions")
            .header(
                "Authorization",
                format!("Bearer {}", test_tokens::valid(TEST_ACCOUNT)),
            )
            .header("content-type", "application/json")
            .header("x-forwarded-for", "192.0.2.66")
            .body(Body::from(
                serde_json::json!({ "password": TEST_PASSWORD }).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let (_, body) = call(&app, "GET", "/v1/wallet/audit", None, None).await;
        assert_eq!(body["entries"][0]["action"], "session_created");
        assert!(body["entries"][0].get("client_ip").is_none());
    }

    #[test]
    fn openapi_lists_wallet_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/wallet/sign/transaction"));
        assert!(doc.paths.paths.contains_key("/v1/wallet/sessions"));
    }
}
