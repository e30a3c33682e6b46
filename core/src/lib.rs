//! AVA Talk core - shared library for the AVA Talk two-way audio relay.
//!
//! Bridges a browser/app WebSocket microphone stream to a Dahua-compatible
//! doorbell's ONVIF RTSP backchannel, running the audio through a small DSP
//! chain and encoding it to G.711 A-law for the wire.
//!
//! # Architecture
//!
//! - [`alaw`]: G.711 A-law sample encoding
//! - [`conditioner`]: per-session FIR smoothing, noise gate, AGC, soft limiter
//! - [`rtsp`]: RTSP/RTP backchannel client (Digest auth, SDP, RTP framing)
//! - [`reset`]: upstream-reset helper for wedged doorbell backchannels
//! - [`session`]: per-session retry/backoff state machine
//! - [`registry`]: process-wide live-session accounting
//! - [`config`]: relay configuration
//! - [`relay`]: the WebSocket relay server itself
//! - [`error`]: centralized error types

#![warn(clippy::all)]

pub mod alaw;
pub mod conditioner;
pub mod config;
pub mod error;
pub mod protocol_constants;
pub mod registry;
pub mod relay;
pub mod reset;
pub mod rtsp;
pub mod session;

pub use config::RelayConfig;
pub use error::{ErrorCode, RelayError, RelayResult};
pub use registry::{SessionGuard, SessionRegistry};
pub use relay::{build_router, RelayState};
pub use rtsp::{BackchannelSession, ConnectErrorKind, RtspConnectError};
pub use session::SessionState;
