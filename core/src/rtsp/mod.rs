//! RTSP/RTP backchannel client: Digest auth, SDP parsing, RTP framing, and
//! the DESCRIBE/SETUP/PLAY handshake itself.

pub mod client;
pub mod digest;
pub mod rtp;
pub mod sdp;

pub use client::{BackchannelSession, ConnectErrorKind, RtspConnectError};
