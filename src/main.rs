// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process, sync::Arc};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;

use wallet_guard_server::{
    api::router,
    auth::IdentityVerifier,
    blockchain::RpcBroadcaster,
    config::Config,
    custody::LocalKeyCustody,
    logging::init_tracing,
    security::{ExpirySweeper, GatewayBackends, SigningGateway, SystemClock},
    state::AppState,
    storage::{MemoryCounterStore, SecurityDatabase, StoragePaths},
};

#[tokio::main]
async fn main() {
    // Must be installed before any TLS operation.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Failed to install rustls crypto provider");
        process::exit(1);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(1);
        }
    };
    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server exited with error");
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let paths = StoragePaths::new(&config.data_dir);
    let db = Arc::new(SecurityDatabase::open(&paths.security_db())?);
    tracing::info!(path = %paths.security_db().display(), "Security database opened");

    let broadcaster = RpcBroadcaster::new(config.chain.clone())?;
    let gateway = Arc::new(SigningGateway::new(
        GatewayBackends {
            identity: db.clone(),
            sessions: db.clone(),
            audit: db,
            counters: Arc::new(MemoryCounterStore::new()),
            custody: Arc::new(LocalKeyCustody::new()),
            broadcaster: Arc::new(broadcaster),
            clock: Arc::new(SystemClock),
        },
        config.kek,
        config.chain.clone(),
        config.policy.clone(),
    ));

    let identity = IdentityVerifier::hs256(config.jwt_secret.as_bytes());
    let state = AppState::new(gateway.clone(), identity)
        .with_data_dir(&config.data_dir)
        .with_trusted_proxy(config.trust_proxy_headers);
    let app = router(state);

    let shutdown = CancellationToken::new();
    let sweeper = ExpirySweeper::new(gateway).with_interval(config.sweep_interval);
    let sweeper_task = tokio::spawn(sweeper.run(shutdown.clone()));

    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("Could not listen for ctrl-c; shutdown only via process kill");
                return;
            }
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
            handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        }
    });

    let addr = config.bind_addr;
    tracing::info!(
        %addr,
        chain_id = config.chain.chain_id,
        tls = config.tls.is_some(),
        "Wallet guard listening (docs at /docs)"
    );

    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
        None => {
            tracing::warn!("TLS_CERT_PATH/TLS_KEY_PATH not set; serving plain HTTP");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await?;
        }
    }

    shutdown.cancel();
    let _ = sweeper_task.await;
    Ok(())
}
