//! WebSocket handler implementing the per-session retry/backoff controller.

use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use serde::Serialize;

use super::RelayState;
use crate::error::{ErrorCode, RelayError};
use crate::protocol_constants::{
    FORMAT_TAG_ALAW, FORMAT_TAG_PCM16, MAX_INBOUND_FRAME_BYTES, WS_PING_INTERVAL_SECS,
    WS_PONG_TIMEOUT_SECS,
};
use crate::reset;
use crate::rtsp::BackchannelSession;
use crate::session::{ConnectOutcome, FrameDecision, SessionState};

/// Server-to-client status messages (§4.5).
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum StatusMessage {
    BackchannelConnecting,
    BackchannelReady,
    BackchannelFailed { retry_in: u64 },
    BackchannelUnavailable,
}

impl StatusMessage {
    fn into_message(self) -> Option<Message> {
        serde_json::to_string(&self).ok().map(|s| Message::Text(s.into()))
    }
}

async fn send_status(sender: &mut SplitSink<WebSocket, Message>, status: StatusMessage) {
    if let Some(msg) = status.into_message() {
        let _ = sender.send(msg).await;
    }
}

/// Sleeps until `deadline`, or forever if there is none -- used as the
/// session loop's retry-backoff branch in `select!` so a retry due after the
/// first failure fires on its own without waiting for another inbound audio
/// frame (§5: "sleeping on the retry backoff" is a suspension point of the
/// mic session itself).
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(instant) => tokio::time::sleep_until(instant.into()).await,
        None => std::future::pending().await,
    }
}

/// Decodes a little-endian PCM16 payload into samples.
fn decode_pcm16le(payload: &[u8]) -> Vec<i16> {
    payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// WebSocket upgrade entry point.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: RelayState) {
    let (mut sender, mut receiver) = socket.split();
    let guard = state.sessions.register();
    log::info!("[Relay] session {} started", guard.id());

    let mut session = SessionState::new();
    let mut backchannel: Option<BackchannelSession> = None;
    let mut last_pong = Instant::now();

    let mut ping_interval = tokio::time::interval(Duration::from_secs(WS_PING_INTERVAL_SECS));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                log::info!("[Relay] session {} shutting down (server stopping)", guard.id());
                break;
            }
            () = sleep_until_deadline(session.backoff_deadline()) => {
                attempt_connect(&state, &mut session, &mut backchannel, &mut sender, guard.id(), false).await;
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        if data.len() > MAX_INBOUND_FRAME_BYTES {
                            log::warn!(
                                "[Relay] session {} sent an oversized frame ({} bytes), closing",
                                guard.id(),
                                data.len()
                            );
                            break;
                        }
                        if let Some(decoded) = decode_to_alaw(&mut session, &data, guard.id()) {
                            handle_audio_frame(
                                &state,
                                &mut session,
                                &mut backchannel,
                                &mut sender,
                                decoded,
                                guard.id(),
                            )
                            .await;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            _ = ping_interval.tick() => {
                if last_pong.elapsed() > Duration::from_secs(WS_PONG_TIMEOUT_SECS) {
                    log::warn!("[Relay] session {} timed out waiting for pong", guard.id());
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    session.mark_disconnected();
    if let Some(mut bc) = backchannel.take() {
        let _ = tokio::task::spawn_blocking(move || bc.teardown()).await;
    }
    log::info!("[Relay] session {} ended", guard.id());
}

/// One decoded inbound audio frame, tagged with whether it actually carries
/// audio that should reach the doorbell or is closed-gate silence that
/// should be dropped on the floor without advancing the RTP stream (§8
/// scenario 1: a closed gate emits no RTP packet at all, not a
/// silence-filled one).
struct DecodedFrame {
    alaw: Vec<u8>,
    transmit: bool,
}

/// Applies the format-tag dispatch from §4.5: PCM16 runs through the DSP
/// chain, A-law passes through untouched, unknown tags are logged and
/// dropped.
fn decode_to_alaw(session: &mut SessionState, data: &[u8], session_id: &str) -> Option<DecodedFrame> {
    let (&tag, payload) = data.split_first()?;
    match tag {
        FORMAT_TAG_PCM16 => {
            let samples = decode_pcm16le(payload);
            let alaw = session.conditioner.process(&samples);
            let transmit = !session.conditioner.gated_last_chunk();
            Some(DecodedFrame { alaw, transmit })
        }
        FORMAT_TAG_ALAW => Some(DecodedFrame {
            alaw: payload.to_vec(),
            transmit: true,
        }),
        other => {
            log::debug!(
                "[Relay] session {session_id} dropped frame with unknown format tag 0x{other:02x}"
            );
            None
        }
    }
}

async fn handle_audio_frame(
    state: &RelayState,
    session: &mut SessionState,
    backchannel: &mut Option<BackchannelSession>,
    sender: &mut SplitSink<WebSocket, Message>,
    decoded: DecodedFrame,
    session_id: &str,
) {
    // Connection management runs regardless of whether this particular
    // chunk carries audio or closed-gate silence -- the retry controller
    // reacts to arriving frames, not to their content.
    match session.on_frame_arrival() {
        FrameDecision::Drop => {}
        FrameDecision::Send => {
            if decoded.transmit {
                send_alaw(session, backchannel, &decoded.alaw, session_id);
            }
        }
        FrameDecision::AttemptConnect => {
            attempt_connect(state, session, backchannel, sender, session_id, true).await;
            if session.connected && decoded.transmit {
                send_alaw(session, backchannel, &decoded.alaw, session_id);
            }
        }
    }
}

fn send_alaw(
    session: &mut SessionState,
    backchannel: &mut Option<BackchannelSession>,
    alaw_bytes: &[u8],
    session_id: &str,
) {
    if let Some(bc) = backchannel {
        if !bc.send(alaw_bytes) {
            log::warn!("[Relay] session {session_id} backchannel send failed");
            session.mark_disconnected();
        }
    }
}

/// Runs one `connect` attempt (on a worker thread), updates retry state,
/// and -- if this is the failure that should trigger the upstream-reset
/// helper -- runs it and retries once more.
///
/// `announce_connecting` gates `backchannel_connecting`: only the fresh,
/// fail_count == 0 trigger from [`FrameDecision::AttemptConnect`] sends it
/// (§4.5); later retries driven by the session's own backoff timer go
/// straight to `try_connect_once` and report only `backchannel_failed` /
/// `backchannel_ready` / `backchannel_unavailable`.
async fn attempt_connect(
    state: &RelayState,
    session: &mut SessionState,
    backchannel: &mut Option<BackchannelSession>,
    sender: &mut SplitSink<WebSocket, Message>,
    session_id: &str,
    announce_connecting: bool,
) {
    if announce_connecting {
        send_status(sender, StatusMessage::BackchannelConnecting).await;
    }

    let outcome = try_connect_once(state, session, backchannel, session_id).await;

    match outcome {
        ConnectOutcome::Ready => {
            send_status(sender, StatusMessage::BackchannelReady).await;
        }
        ConnectOutcome::Failed { retry_in } => {
            send_status(sender, StatusMessage::BackchannelFailed { retry_in }).await;
        }
        ConnectOutcome::GaveUp => {
            send_status(sender, StatusMessage::BackchannelUnavailable).await;
        }
        ConnectOutcome::FailedTriggerReset { retry_in } => {
            send_status(sender, StatusMessage::BackchannelFailed { retry_in }).await;
            log::info!("[Relay] session {session_id} running upstream-reset helper");

            let reset_result = reset::run(
                &state.http,
                &state.config.upstream_api_base,
                &state.config.upstream_stream_name,
            )
            .await;

            if let Err(e) = reset_result {
                let err = RelayError::from(e);
                log::warn!(
                    "[Relay] session {session_id} upstream-reset helper failed: {err} ({})",
                    err.code()
                );
                return;
            }

            let retry_outcome = try_connect_once(state, session, backchannel, session_id).await;
            match retry_outcome {
                ConnectOutcome::Ready => {
                    send_status(sender, StatusMessage::BackchannelReady).await;
                }
                ConnectOutcome::GaveUp => {
                    send_status(sender, StatusMessage::BackchannelUnavailable).await;
                }
                ConnectOutcome::Failed { retry_in } | ConnectOutcome::FailedTriggerReset { retry_in } => {
                    send_status(sender, StatusMessage::BackchannelFailed { retry_in }).await;
                }
            }
        }
    }
}

async fn try_connect_once(
    state: &RelayState,
    session: &mut SessionState,
    backchannel: &mut Option<BackchannelSession>,
    session_id: &str,
) -> ConnectOutcome {
    let doorbell = state.config.doorbell.clone();
    let result = tokio::task::spawn_blocking(move || {
        BackchannelSession::connect(
            &doorbell.ip,
            doorbell.rtsp_port,
            &doorbell.username,
            &doorbell.password,
            &doorbell.path,
            doorbell.channel,
        )
    })
    .await
    .expect("connect worker thread should not panic");

    match result {
        Ok(bc) => {
            *backchannel = Some(bc);
            session.on_connect_success()
        }
        Err(e) => {
            let kind = e.kind;
            let err = RelayError::from(e);
            log::warn!(
                "[Relay] session {session_id} backchannel connect failed: {err} ({})",
                err.code()
            );
            session.on_connect_failure(kind, Instant::now())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_to_alaw_passes_through_alaw_payload() {
        let mut data = vec![FORMAT_TAG_ALAW];
        data.extend_from_slice(&[0xD5, 0xD5, 0xAA]);
        let mut session = SessionState::new();
        let out = decode_to_alaw(&mut session, &data, "test").expect("should decode");
        assert_eq!(out.alaw, vec![0xD5, 0xD5, 0xAA]);
        assert!(out.transmit, "A-law passthrough always transmits");
    }

    #[test]
    fn decode_to_alaw_drops_unknown_tag() {
        let data = vec![0xFF, 0x00, 0x00];
        let mut session = SessionState::new();
        assert!(decode_to_alaw(&mut session, &data, "test").is_none());
    }

    #[test]
    fn decode_to_alaw_runs_pcm_through_conditioner() {
        let mut data = vec![FORMAT_TAG_PCM16];
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        let mut session = SessionState::new();
        let out = decode_to_alaw(&mut session, &data, "test").expect("should decode");
        assert_eq!(out.alaw.len(), 2);
    }

    #[test]
    fn decode_to_alaw_marks_closed_gate_as_not_transmitted() {
        // Silent PCM16 input never crosses the noise-gate threshold, so the
        // chunk must be flagged as non-transmitting (§8 scenario 1).
        let mut data = vec![FORMAT_TAG_PCM16];
        data.extend(std::iter::repeat(0u8).take(640));
        let mut session = SessionState::new();
        let out = decode_to_alaw(&mut session, &data, "test").expect("should decode");
        assert!(!out.transmit);
        assert_eq!(out.alaw, vec![crate::protocol_constants::ALAW_SILENCE; 320]);
    }

    #[test]
    fn decode_to_alaw_marks_open_gate_as_transmitted() {
        let mut data = vec![FORMAT_TAG_PCM16];
        for i in 0..320i16 {
            let sample: i16 = if i % 2 == 0 { 20000 } else { -20000 };
            data.extend_from_slice(&sample.to_le_bytes());
        }
        let mut session = SessionState::new();
        let out = decode_to_alaw(&mut session, &data, "test").expect("should decode");
        assert!(out.transmit);
    }

    #[test]
    fn decode_pcm16le_reads_little_endian_pairs() {
        let bytes = [0x00, 0x00, 0xFF, 0x7F, 0x00, 0x80];
        let samples = decode_pcm16le(&bytes);
        assert_eq!(samples, vec![0, i16::MAX, i16::MIN]);
    }
}
