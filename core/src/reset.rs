//! Upstream-Reset Helper: works around doorbell firmware that wedges its
//! backchannel state machine after a ring event, by cycling the primary RTSP
//! producer binding held by the upstream media server.
//!
//! Best-effort and silent: any failure here just means the caller's next
//! `connect` attempt behaves as if the reset never ran.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::protocol_constants::{
    RESET_HELPER_DELETE_PUT_DELAY_SECS, RESET_HELPER_HTTP_TIMEOUT_SECS,
    RESET_HELPER_POST_PUT_DELAY_SECS,
};

/// Errors from one reset attempt. Callers only use this for logging; it
/// never changes retry-state semantics beyond "did not help".
#[derive(Debug, Error)]
pub enum ResetError {
    #[error("request to upstream media server failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stream {0:?} has no rtsp:// producer")]
    NoRtspProducer(String),
}

#[derive(Debug, Deserialize)]
struct StreamsResponse(std::collections::HashMap<String, StreamEntry>);

#[derive(Debug, Deserialize)]
struct StreamEntry {
    #[serde(default)]
    producers: Vec<Producer>,
}

#[derive(Debug, Deserialize)]
struct Producer {
    url: String,
}

/// Runs the full DELETE/PUT cycle against the upstream media server's
/// producer binding for `stream_name`.
///
/// Returns `Ok(())` once the helper has slept through both delays; the
/// caller should retry `connect` only after this resolves.
pub async fn run(
    client: &Client,
    upstream_api_base: &str,
    stream_name: &str,
) -> Result<(), ResetError> {
    let producer_url = find_rtsp_producer(client, upstream_api_base, stream_name).await?;

    let delete_url = format!(
        "{upstream_api_base}/api/streams?dst={stream_name}&src={producer_url}",
    );
    client
        .delete(&delete_url)
        .timeout(Duration::from_secs(RESET_HELPER_HTTP_TIMEOUT_SECS))
        .send()
        .await?
        .error_for_status()?;

    tokio::time::sleep(Duration::from_secs(RESET_HELPER_DELETE_PUT_DELAY_SECS)).await;

    let put_url = format!(
        "{upstream_api_base}/api/streams?dst={stream_name}&src={producer_url}",
    );
    client
        .put(&put_url)
        .timeout(Duration::from_secs(RESET_HELPER_HTTP_TIMEOUT_SECS))
        .send()
        .await?
        .error_for_status()?;

    tokio::time::sleep(Duration::from_secs(RESET_HELPER_POST_PUT_DELAY_SECS)).await;

    Ok(())
}

async fn find_rtsp_producer(
    client: &Client,
    upstream_api_base: &str,
    stream_name: &str,
) -> Result<String, ResetError> {
    let url = format!("{upstream_api_base}/api/streams");
    let body: StreamsResponse = client
        .get(&url)
        .timeout(Duration::from_secs(RESET_HELPER_HTTP_TIMEOUT_SECS))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    body.0
        .get(stream_name)
        .and_then(|entry| entry.producers.iter().find(|p| p.url.starts_with("rtsp://")))
        .map(|p| p.url.clone())
        .ok_or_else(|| ResetError::NoRtspProducer(stream_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_response_parses_first_rtsp_producer() {
        let json = r#"{
            "doorbell_direct": {
                "producers": [
                    {"url": "rtmp://127.0.0.1/ignored"},
                    {"url": "rtsp://camera.local:554/feed"}
                ]
            }
        }"#;
        let parsed: StreamsResponse = serde_json::from_str(json).unwrap();
        let entry = parsed.0.get("doorbell_direct").unwrap();
        let rtsp = entry.producers.iter().find(|p| p.url.starts_with("rtsp://"));
        assert_eq!(rtsp.unwrap().url, "rtsp://camera.local:554/feed");
    }

    #[test]
    fn streams_response_missing_stream_has_no_producers() {
        let json = r#"{"other_stream": {"producers": []}}"#;
        let parsed: StreamsResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.0.get("doorbell_direct").is_none());
    }
}
