//! AVA Talk Server - standalone headless server for the two-way audio relay.
//!
//! Bridges browser/app WebSocket microphone sessions to a doorbell's RTSP
//! backchannel, running as a background daemon.

mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use ava_talk_core::{build_router, RelayState};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;

use config::TlsPaths;

/// AVA Talk Server - headless WebSocket-to-RTSP backchannel relay.
#[derive(Parser, Debug)]
#[command(name = "ava-talk-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (JSON).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "AVA_TALK_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Listen port for the relay's WebSocket route (overrides config file).
    #[arg(short = 'p', long, env = "AVA_TALK_PORT")]
    port: Option<u16>,

    /// TLS certificate (PEM). Defaults to `<config_dir>/ssl/ava-admin.crt`;
    /// plain WS is used if the file is absent (§6).
    #[arg(long, value_name = "FILE", env = "AVA_TALK_TLS_CERT")]
    tls_cert: Option<PathBuf>,

    /// TLS private key (PEM). Defaults to `<config_dir>/ssl/ava-admin.key`.
    #[arg(long, value_name = "FILE", env = "AVA_TALK_TLS_KEY")]
    tls_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("AVA Talk Server v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("/etc/ava-talk/config.json"));
    let tls_paths =
        TlsPaths::well_known(&config_path).with_overrides(args.tls_cert.clone(), args.tls_key.clone());

    let relay_config =
        config::load(args.config.as_deref(), args.port).context("failed to load configuration")?;

    log::info!(
        "Configuration: doorbell={}, talk_port={}",
        relay_config.doorbell.ip,
        relay_config.server.talk_port
    );

    let talk_port = relay_config.server.talk_port;
    let state = RelayState::new(relay_config);
    let shutdown_state = state.clone();
    let router = build_router(state);

    if tls_paths.available() {
        log::info!(
            "TLS cert/key found at {} / {}, serving WSS",
            tls_paths.cert.display(),
            tls_paths.key.display()
        );
        let tls_config = RustlsConfig::from_pem_file(&tls_paths.cert, &tls_paths.key)
            .await
            .context("failed to load TLS cert/key")?;

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], talk_port));
        log::info!("Relay listening on port {talk_port} (TLS)");

        let handle = axum_server::Handle::new();
        let serve_handle = handle.clone();
        let server = tokio::spawn(async move {
            if let Err(e) = axum_server::bind_rustls(addr, tls_config)
                .handle(serve_handle)
                .serve(router.into_make_service())
                .await
            {
                log::error!("Server error: {e}");
            }
        });

        shutdown_signal().await;
        log::info!("Shutdown signal received, cleaning up...");
        shutdown_state.begin_shutdown();
        handle.graceful_shutdown(Some(Duration::from_secs(5)));
        let _ = server.await;
    } else {
        let listener = TcpListener::bind(("0.0.0.0", talk_port))
            .await
            .with_context(|| format!("failed to bind talk port {talk_port}"))?;

        log::info!("Relay listening on port {talk_port} (plain WS, no TLS cert/key found)");

        let server = tokio::spawn(async move {
            let drain = async move {
                shutdown_signal().await;
                log::info!("Shutdown signal received, cleaning up...");
                shutdown_state.begin_shutdown();
                tokio::time::sleep(Duration::from_secs(5)).await;
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(drain)
                .await
            {
                log::error!("Server error: {e}");
            }
        });

        let _ = server.await;
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
