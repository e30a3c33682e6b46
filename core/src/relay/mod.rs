//! Relay server: accepts WebSocket microphone sessions and drives a
//! per-session RTSP backchannel to the doorbell.

pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::protocol_constants::RESET_HELPER_HTTP_TIMEOUT_SECS;
use crate::registry::SessionRegistry;

/// Shared state for the relay's WebSocket route.
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    pub http: Client,
    pub sessions: Arc<SessionRegistry>,
    /// Cancelled by the binary's shutdown-signal handler; each session task
    /// selects on this alongside its socket read so in-flight sessions wind
    /// down cooperatively instead of being dropped mid-teardown (§5).
    pub shutdown: CancellationToken,
}

impl RelayState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(RESET_HELPER_HTTP_TIMEOUT_SECS))
            .build()
            .expect("reqwest client builds with static config");

        Self {
            config: Arc::new(config),
            http,
            sessions: Arc::new(SessionRegistry::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Number of currently live talk sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.count()
    }

    /// Signals every session task to wind down: stop reading further frames,
    /// tear down its backchannel if connected, and exit.
    pub fn begin_shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Builds the relay's router: a single WebSocket route at `/`.
#[must_use]
pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(ws::ws_handler))
        .with_state(state)
}
