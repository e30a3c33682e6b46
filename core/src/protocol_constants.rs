//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the backchannel spec (ONVIF/RTSP/RTP) or by the
//! DSP chain's tuning and changing them would break protocol compliance or
//! audible quality.

// ─────────────────────────────────────────────────────────────────────────────
// A-law codec
// ─────────────────────────────────────────────────────────────────────────────

/// A-law encoding of a zero-valued PCM sample. Emitted as filler when the
/// noise gate is closed.
pub const ALAW_SILENCE: u8 = 0xD5;

// ─────────────────────────────────────────────────────────────────────────────
// Audio conditioner (noise gate / AGC / soft limiter)
// ─────────────────────────────────────────────────────────────────────────────

/// Chunk peak amplitude below which the noise gate closes.
pub const NOISE_GATE_THRESHOLD: i32 = 30;

/// Number of chunks the gate stays open after the signal last crossed
/// [`NOISE_GATE_THRESHOLD`].
pub const NOISE_GATE_HOLD_CHUNKS: u32 = 12;

/// Target peak amplitude the AGC tries to converge the chunk toward.
pub const AGC_TARGET: f64 = 12000.0;

/// Minimum allowed AGC gain.
pub const AGC_MIN_GAIN: f64 = 1.0;

/// Maximum allowed AGC gain.
pub const AGC_MAX_GAIN: f64 = 30.0;

/// Attack coefficient (fast, applied when gain is decreasing).
pub const AGC_ATTACK_COEFF: f64 = 0.05;

/// Release coefficient (slow, applied when gain is increasing).
pub const AGC_RELEASE_COEFF: f64 = 0.90;

/// Sample magnitude above which the soft limiter engages.
pub const SOFT_LIMIT: i32 = 12000;

/// Asymptote the soft limiter's hyperbolic curve approaches.
pub const SOFT_CEILING: i32 = 28000;

// ─────────────────────────────────────────────────────────────────────────────
// RTSP backchannel
// ─────────────────────────────────────────────────────────────────────────────

/// TCP connect timeout for the RTSP control socket.
pub const RTSP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout applied to the socket during the DESCRIBE/SETUP/PLAY handshake.
pub const RTSP_HANDSHAKE_READ_TIMEOUT_SECS: u64 = 5;

/// `User-Agent` header sent on every RTSP request.
pub const RTSP_USER_AGENT: &str = "AVA-Talk/1.0";

/// ONVIF backchannel capability required on DESCRIBE.
pub const ONVIF_BACKCHANNEL_REQUIRE: &str = "www.onvif.org/ver20/backchannel";

/// RTP payload type for G.711 A-law (PCMA).
pub const RTP_PAYLOAD_TYPE_PCMA: u8 = 8;

/// RTP version field value (RFC 3550).
pub const RTP_VERSION: u8 = 2;

/// Magic byte that opens an RTSP interleaved binary frame (RFC 2326 §10.12).
pub const INTERLEAVED_MAGIC: u8 = 0x24;

// ─────────────────────────────────────────────────────────────────────────────
// Retry / backoff
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum number of consecutive `connect` attempts before giving up.
pub const RETRY_MAX_ATTEMPTS: u32 = 5;

/// Base used for the exponential backoff delay: `2 * 2^(fail_count - 1)`.
pub const RETRY_BACKOFF_BASE_SECS: u64 = 2;

/// Upper bound applied to every backoff delay.
pub const RETRY_BACKOFF_CAP_SECS: u64 = 30;

/// `fail_count` value at which the upstream-reset helper is attempted, gated
/// on the failing kind being `DESCRIBE_404` and the helper not having already
/// run this session.
pub const RESET_HELPER_TRIGGER_FAIL_COUNT: u32 = 3;

// ─────────────────────────────────────────────────────────────────────────────
// Upstream-reset helper
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for every HTTP call the reset helper makes against the upstream
/// media server.
pub const RESET_HELPER_HTTP_TIMEOUT_SECS: u64 = 5;

/// Delay between the DELETE and the PUT calls.
pub const RESET_HELPER_DELETE_PUT_DELAY_SECS: u64 = 2;

/// Delay after the PUT call before the caller retries the backchannel.
pub const RESET_HELPER_POST_PUT_DELAY_SECS: u64 = 4;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket ingress
// ─────────────────────────────────────────────────────────────────────────────

/// Interval between WebSocket ping frames.
pub const WS_PING_INTERVAL_SECS: u64 = 20;

/// How long the server waits for a pong before closing an unresponsive client.
pub const WS_PONG_TIMEOUT_SECS: u64 = 10;

/// Maximum size of an inbound binary WebSocket frame; larger frames close
/// the connection.
pub const MAX_INBOUND_FRAME_BYTES: usize = 65536;

/// Format tag marking PCM16LE mono 8kHz payload.
pub const FORMAT_TAG_PCM16: u8 = 0x01;

/// Format tag marking raw G.711 A-law payload.
pub const FORMAT_TAG_ALAW: u8 = 0x03;

// ─────────────────────────────────────────────────────────────────────────────
// Application identity / defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in logs.
pub const APP_NAME: &str = "AVA Talk Relay";

/// Default RTSP port on the doorbell.
pub const DEFAULT_RTSP_PORT: u16 = 554;

/// Default WebSocket listen port.
pub const DEFAULT_TALK_PORT: u16 = 5001;

/// Default camera control path segment.
pub const DEFAULT_CAMERA_PATH: &str = "cam/realmonitor";

/// Default ONVIF channel number.
pub const DEFAULT_CAMERA_CHANNEL: u32 = 1;

/// Default stream name used when cycling the upstream media server's binding.
pub const DEFAULT_UPSTREAM_STREAM_NAME: &str = "doorbell_direct";
