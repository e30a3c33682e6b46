//! Handcrafted, single-client, send-only RTSP/RTP backchannel driver.
//!
//! The handshake (DESCRIBE/SETUP/PLAY) is synchronous, line-oriented I/O on
//! a plain [`std::net::TcpStream`]. Callers run [`BackchannelSession::connect`]
//! on a blocking worker thread (`tokio::task::spawn_blocking`); the async
//! event loop only awaits the join handle. Sending an already-encoded A-law
//! payload is a single inline, non-blocking-enough socket write.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use super::digest;
use super::rtp::{wrap_interleaved, RtpState};
use super::sdp;
use crate::error::ErrorCode;
use crate::protocol_constants::{
    ONVIF_BACKCHANNEL_REQUIRE, RTSP_CONNECT_TIMEOUT_SECS, RTSP_HANDSHAKE_READ_TIMEOUT_SECS,
    RTSP_USER_AGENT,
};

/// Classified RTSP `connect` failure kinds, matching the failure shapes the
/// retry controller (§4.5) discriminates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    Describe404,
    DescribeOther,
    NoTrack,
    SetupFailed,
    PlayFailed,
    Exception,
}

/// Error returned by [`BackchannelSession::connect`].
#[derive(Debug, Error)]
#[error("RTSP connect failed: {message} ({kind:?})")]
pub struct RtspConnectError {
    pub kind: ConnectErrorKind,
    pub message: String,
}

impl ErrorCode for RtspConnectError {
    fn code(&self) -> &'static str {
        match self.kind {
            ConnectErrorKind::Describe404 => "rtsp_describe_404",
            ConnectErrorKind::DescribeOther => "rtsp_describe_failed",
            ConnectErrorKind::NoTrack => "rtsp_no_backchannel_track",
            ConnectErrorKind::SetupFailed => "rtsp_setup_failed",
            ConnectErrorKind::PlayFailed => "rtsp_play_failed",
            ConnectErrorKind::Exception => "rtsp_exception",
        }
    }
}

fn exception(message: impl Into<String>) -> RtspConnectError {
    RtspConnectError {
        kind: ConnectErrorKind::Exception,
        message: message.into(),
    }
}

impl From<std::io::Error> for RtspConnectError {
    fn from(err: std::io::Error) -> Self {
        exception(err.to_string())
    }
}

/// A single raw RTSP response: status code, headers (lower-cased keys), body.
struct RtspResponse {
    status: u16,
    headers: std::collections::HashMap<String, String>,
    body: String,
}

/// An open, send-only RTSP/RTP backchannel to one doorbell.
///
/// At most one exists per `SessionState` at a time (invariant, §3); the
/// caller is responsible for tearing one down before opening another.
pub struct BackchannelSession {
    socket: TcpStream,
    cseq: u32,
    session_token: Option<String>,
    interleaved_channel: u8,
    rtp: RtpState,
    pub connected: bool,
    base_url: String,
}

impl BackchannelSession {
    /// Runs the full DESCRIBE/SETUP/PLAY handshake against the doorbell.
    ///
    /// Must be called on a blocking worker thread; it performs synchronous
    /// socket I/O for the whole handshake, matching §5's "blocking RTSP
    /// handshake runs on a worker, async loop awaits completion" model.
    pub fn connect(
        host: &str,
        rtsp_port: u16,
        username: &str,
        password: &str,
        path: &str,
        channel: u32,
    ) -> Result<Self, RtspConnectError> {
        let addr = format!("{host}:{rtsp_port}");
        let socket_addr = addr
            .parse()
            .or_else(|_| {
                use std::net::ToSocketAddrs;
                addr.to_socket_addrs()
                    .map_err(|e| e.to_string())
                    .and_then(|mut it| it.next().ok_or_else(|| "no addresses".to_string()))
            })
            .map_err(exception)?;

        let socket = TcpStream::connect_timeout(
            &socket_addr,
            Duration::from_secs(RTSP_CONNECT_TIMEOUT_SECS),
        )?;
        socket.set_read_timeout(Some(Duration::from_secs(
            RTSP_HANDSHAKE_READ_TIMEOUT_SECS,
        )))?;

        let base_url = format!(
            "rtsp://{host}:{rtsp_port}/{path}?channel={channel}&subtype=1&unicast=true&proto=Onvif"
        );

        let mut session = Self {
            socket,
            cseq: 1,
            session_token: None,
            interleaved_channel: 0,
            rtp: RtpState::new(rand::thread_rng().gen()),
            connected: false,
            base_url,
        };

        let sdp_body = session.describe(username, password)?;
        let tracks = sdp::parse_audio_tracks(&sdp_body);
        let control = sdp::find_backchannel_control(&tracks).ok_or_else(|| RtspConnectError {
            kind: ConnectErrorKind::NoTrack,
            message: "no sendonly PCMA/8000 track in SDP".to_string(),
        })?;

        session.setup(control)?;
        session.play()?;

        session.connected = true;
        log::info!("[RTSP] backchannel connected to {host}:{rtsp_port}/{path}");
        Ok(session)
    }

    fn next_cseq(&mut self) -> u32 {
        let cseq = self.cseq;
        self.cseq += 1;
        cseq
    }

    fn send_request(&mut self, request: &str) -> Result<RtspResponse, RtspConnectError> {
        log::debug!("[RTSP] -> {}", request.lines().next().unwrap_or(""));
        self.socket.write_all(request.as_bytes())?;
        read_response(&mut self.socket)
    }

    /// DESCRIBE, transparently retried once with a Digest `Authorization`
    /// header on a 401 challenge.
    fn describe(&mut self, username: &str, password: &str) -> Result<String, RtspConnectError> {
        let cseq = self.next_cseq();
        let request = format!(
            "DESCRIBE {url} RTSP/1.0\r\nCSeq: {cseq}\r\nUser-Agent: {ua}\r\nAccept: application/sdp\r\nRequire: {require}\r\n\r\n",
            url = self.base_url,
            ua = RTSP_USER_AGENT,
            require = ONVIF_BACKCHANNEL_REQUIRE,
        );
        let response = self.send_request(&request)?;

        let response = if response.status == 401 {
            let challenge_header = response
                .headers
                .get("www-authenticate")
                .ok_or_else(|| exception("401 without WWW-Authenticate header"))?;
            let challenge = digest::parse_www_authenticate(challenge_header)
                .ok_or_else(|| exception("malformed WWW-Authenticate header"))?;
            let auth = digest::build_authorization_header(
                &challenge,
                username,
                password,
                "DESCRIBE",
                &self.base_url,
            );

            let cseq = self.next_cseq();
            let request = format!(
                "DESCRIBE {url} RTSP/1.0\r\nCSeq: {cseq}\r\nUser-Agent: {ua}\r\nAccept: application/sdp\r\nRequire: {require}\r\nAuthorization: {auth}\r\n\r\n",
                url = self.base_url,
                ua = RTSP_USER_AGENT,
                require = ONVIF_BACKCHANNEL_REQUIRE,
            );
            self.send_request(&request)?
        } else {
            response
        };

        match response.status {
            200 => Ok(response.body),
            404 => Err(RtspConnectError {
                kind: ConnectErrorKind::Describe404,
                message: "DESCRIBE returned 404".to_string(),
            }),
            other => Err(RtspConnectError {
                kind: ConnectErrorKind::DescribeOther,
                message: format!("DESCRIBE returned {other}"),
            }),
        }
    }

    fn setup(&mut self, control: &str) -> Result<(), RtspConnectError> {
        let cseq = self.next_cseq();
        let url = format!("{}/{}", self.base_url, control);
        let request = format!(
            "SETUP {url} RTSP/1.0\r\nCSeq: {cseq}\r\nUser-Agent: {ua}\r\nTransport: RTP/AVP/TCP;unicast;interleaved=0-1;mode=record\r\n\r\n",
            ua = RTSP_USER_AGENT,
        );
        let response = self.send_request(&request)?;

        if response.status != 200 {
            return Err(RtspConnectError {
                kind: ConnectErrorKind::SetupFailed,
                message: format!("SETUP returned {}", response.status),
            });
        }

        if let Some(session_header) = response.headers.get("session") {
            let token = session_header.split(';').next().unwrap_or(session_header);
            self.session_token = Some(token.trim().to_string());
        }

        if let Some(transport) = response.headers.get("transport") {
            if let Some(channel) = parse_interleaved_channel(transport) {
                self.interleaved_channel = channel;
            }
        }

        Ok(())
    }

    fn play(&mut self) -> Result<(), RtspConnectError> {
        let cseq = self.next_cseq();
        let session = self.session_token.clone().unwrap_or_default();
        let request = format!(
            "PLAY {url} RTSP/1.0\r\nCSeq: {cseq}\r\nUser-Agent: {ua}\r\nSession: {session}\r\n\r\n",
            url = self.base_url,
            ua = RTSP_USER_AGENT,
        );
        let response = self.send_request(&request)?;

        if response.status != 200 {
            return Err(RtspConnectError {
                kind: ConnectErrorKind::PlayFailed,
                message: format!("PLAY returned {}", response.status),
            });
        }
        Ok(())
    }

    /// Sends one A-law payload as an interleaved RTP packet. Returns `false`
    /// (and marks the session disconnected) on any write failure.
    pub fn send(&mut self, alaw_payload: &[u8]) -> bool {
        let rtp_packet = self.rtp.build_packet(alaw_payload);
        let frame = wrap_interleaved(self.interleaved_channel, &rtp_packet);

        match self.socket.write_all(&frame) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[RTSP] send failed: {e}");
                self.connected = false;
                false
            }
        }
    }

    /// Best-effort TEARDOWN followed by closing the socket. Errors are
    /// swallowed; this is never allowed to fail the caller.
    pub fn teardown(&mut self) {
        let cseq = self.next_cseq();
        let session = self.session_token.clone().unwrap_or_default();
        let request = format!(
            "TEARDOWN {url} RTSP/1.0\r\nCSeq: {cseq}\r\nUser-Agent: {ua}\r\nSession: {session}\r\n\r\n",
            url = self.base_url,
            ua = RTSP_USER_AGENT,
        );
        if let Err(e) = self.socket.write_all(request.as_bytes()) {
            log::debug!("[RTSP] TEARDOWN write failed (ignored): {e}");
            return;
        }
        let _ = read_response(&mut self.socket);
        self.connected = false;
        log::info!("[RTSP] backchannel torn down");
    }
}

/// Extracts the first interleaved channel number from a `Transport:` header
/// value such as `RTP/AVP/TCP;unicast;interleaved=2-3;...`.
fn parse_interleaved_channel(transport: &str) -> Option<u8> {
    for part in transport.split(';') {
        if let Some(rest) = part.trim().strip_prefix("interleaved=") {
            let first = rest.split('-').next()?;
            return first.parse().ok();
        }
    }
    None
}

/// Reads one RTSP response: status line, headers, and body (per
/// `Content-Length`, if present).
fn read_response(socket: &mut TcpStream) -> Result<RtspResponse, RtspConnectError> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1];

    // Read until the blank line terminating the header block.
    loop {
        let n = socket.read(&mut buf)?;
        if n == 0 {
            return Err(exception("connection closed while reading response"));
        }
        raw.push(buf[0]);
        if raw.len() >= 4 && &raw[raw.len() - 4..] == b"\r\n\r\n" {
            break;
        }
    }

    let header_block = String::from_utf8_lossy(&raw).to_string();
    let mut lines = header_block.lines();
    let status_line = lines.next().ok_or_else(|| exception("empty response"))?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| exception(format!("malformed status line: {status_line}")))?;

    let mut headers = std::collections::HashMap::new();
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body_bytes = vec![0u8; content_length];
    if content_length > 0 {
        socket.read_exact(&mut body_bytes)?;
    }

    Ok(RtspResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&body_bytes).to_string(),
    })
}
