// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, default values and the security policy used
//! throughout the service. Configuration is loaded from the environment once
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for the security database | `/data` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `WALLET_KEK` | Key-encryption key, 64 hex chars | Required |
//! | `IDENTITY_JWT_SECRET` | HS256 secret for identity bearer tokens | Required |
//! | `CHAIN_RPC_URL` | EVM JSON-RPC endpoint | Avalanche Fuji |
//! | `CHAIN_ID` | EVM chain ID | `43113` |
//! | `SIGNING_TIMEOUT_SECS` | Default deadline for decrypt/sign/broadcast | `10` |
//! | `SWEEP_INTERVAL_SECS` | Expired session/rate window sweep period | `60` |
//! | `TLS_CERT_PATH` | PEM certificate chain (TLS when both set) | Unset |
//! | `TLS_KEY_PATH` | PEM private key (TLS when both set) | Unset |
//! | `TRUST_PROXY_HEADERS` | Take client IP from `X-Forwarded-For`/`X-Real-IP` | `false` |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::blockchain::{ChainConfig, FUJI_CHAIN_ID, FUJI_RPC_URL};
use crate::custody::KeyEncryptionKey;
use crate::storage::paths::DATA_ROOT;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the data directory path.
///
/// The redb security database lives under `<DATA_DIR>/security/`.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Hex-encoded 32-byte key-encryption key used to unseal private keys.
pub const WALLET_KEK_ENV: &str = "WALLET_KEK";

/// Shared secret for HS256 identity bearer tokens.
pub const IDENTITY_JWT_SECRET_ENV: &str = "IDENTITY_JWT_SECRET";

pub const CHAIN_RPC_URL_ENV: &str = "CHAIN_RPC_URL";
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
pub const SIGNING_TIMEOUT_SECS_ENV: &str = "SIGNING_TIMEOUT_SECS";
pub const SWEEP_INTERVAL_SECS_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

/// Only enable behind a reverse proxy that overwrites forwarding headers.
pub const TRUST_PROXY_HEADERS_ENV: &str = "TRUST_PROXY_HEADERS";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SIGNING_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Sessions live exactly this long; use never extends them.
pub const SESSION_TTL_MINUTES: i64 = 30;
/// Consecutive failures that lock an account.
pub const MAX_FAILED_ATTEMPTS: u32 = 4;
pub const LOCKOUT_MINUTES: i64 = 15;
/// Signing operations allowed per account per window.
pub const RATE_LIMIT_MAX: u32 = 10;
pub const RATE_LIMIT_WINDOW_SECS: i64 = 60;

/// Security constants shared by the verifier, session store and gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub session_ttl: Duration,
    pub max_failed_attempts: u32,
    pub lockout_duration: Duration,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    /// Deadline applied when a request does not bring its own.
    pub signing_timeout: StdDuration,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            session_ttl: Duration::minutes(SESSION_TTL_MINUTES),
            max_failed_attempts: MAX_FAILED_ATTEMPTS,
            lockout_duration: Duration::minutes(LOCKOUT_MINUTES),
            rate_limit_max: RATE_LIMIT_MAX,
            rate_limit_window: Duration::seconds(RATE_LIMIT_WINDOW_SECS),
            signing_timeout: StdDuration::from_secs(DEFAULT_SIGNING_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Optional TLS material; TLS is enabled only when both paths are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Fully resolved service configuration.
#[derive(Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub log_format: LogFormat,
    pub kek: KeyEncryptionKey,
    pub jwt_secret: String,
    pub chain: ChainConfig,
    pub policy: SecurityPolicy,
    pub sweep_interval: StdDuration,
    pub tls: Option<TlsPaths>,
    pub trust_proxy_headers: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let data_dir = PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()));

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Pretty,
            Some(v) if v == "pretty" => LogFormat::Pretty,
            Some(v) if v == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected `json` or `pretty`, got `{other}`"),
                })
            }
        };

        let kek_hex = get(WALLET_KEK_ENV).ok_or(ConfigError::Missing(WALLET_KEK_ENV))?;
        let kek = KeyEncryptionKey::from_hex(&kek_hex).map_err(|e| ConfigError::Invalid {
            name: WALLET_KEK_ENV,
            reason: e.to_string(),
        })?;

        let jwt_secret =
            get(IDENTITY_JWT_SECRET_ENV).ok_or(ConfigError::Missing(IDENTITY_JWT_SECRET_ENV))?;

        let chain_id = parse_or(get(CHAIN_ID_ENV), CHAIN_ID_ENV, FUJI_CHAIN_ID)?;
        let rpc_url = get(CHAIN_RPC_URL_ENV).unwrap_or_else(|| FUJI_RPC_URL.to_string());
        url::Url::parse(&rpc_url).map_err(|e| ConfigError::Invalid {
            name: CHAIN_RPC_URL_ENV,
            reason: e.to_string(),
        })?;
        let chain = ChainConfig {
            name: if chain_id == FUJI_CHAIN_ID {
                ChainConfig::fuji().name
            } else {
                format!("EVM chain {chain_id}")
            },
            chain_id,
            rpc_url,
        };

        let timeout_secs = parse_or(
            get(SIGNING_TIMEOUT_SECS_ENV),
            SIGNING_TIMEOUT_SECS_ENV,
            DEFAULT_SIGNING_TIMEOUT_SECS,
        )?;
        let sweep_secs = parse_or(
            get(SWEEP_INTERVAL_SECS_ENV),
            SWEEP_INTERVAL_SECS_ENV,
            DEFAULT_SWEEP_INTERVAL_SECS,
        )?;
        if timeout_secs == 0 || sweep_secs == 0 {
            return Err(ConfigError::Invalid {
                name: if timeout_secs == 0 {
                    SIGNING_TIMEOUT_SECS_ENV
                } else {
                    SWEEP_INTERVAL_SECS_ENV
                },
                reason: "must be greater than zero".to_string(),
            });
        }

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let trust_proxy_headers =
            parse_or(get(TRUST_PROXY_HEADERS_ENV), TRUST_PROXY_HEADERS_ENV, false)?;

        Ok(Self {
            bind_addr,
            data_dir,
            log_format,
            kek,
            jwt_secret,
            chain,
            policy: SecurityPolicy {
                signing_timeout: StdDuration::from_secs(timeout_secs),
                ..SecurityPolicy::default()
            },
            sweep_interval: StdDuration::from_secs(sweep_secs),
            tls,
            trust_proxy_headers,
        })
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}
