//! Relay configuration: doorbell connection details and listen settings,
//! loaded from the external admin config store's JSON document.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    DEFAULT_CAMERA_CHANNEL, DEFAULT_CAMERA_PATH, DEFAULT_RTSP_PORT, DEFAULT_TALK_PORT,
    DEFAULT_UPSTREAM_STREAM_NAME,
};

/// Doorbell connection settings, as read from the admin config store's
/// `doorbell` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorbellConfig {
    pub ip: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_rtsp_port")]
    pub rtsp_port: u16,
    /// Camera control path segment, e.g. `cam/realmonitor`. Read from the
    /// admin config's camera schema but never written by this core.
    #[serde(default = "default_camera_path")]
    pub path: String,
    /// ONVIF channel number. Read-only here, same as `path`.
    #[serde(default = "default_camera_channel")]
    pub channel: u32,
}

fn default_rtsp_port() -> u16 {
    DEFAULT_RTSP_PORT
}

fn default_camera_path() -> String {
    DEFAULT_CAMERA_PATH.to_string()
}

fn default_camera_channel() -> u32 {
    DEFAULT_CAMERA_CHANNEL
}

/// Server-side listen settings, as read from the admin config store's
/// `server` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_talk_port")]
    pub talk_port: u16,
}

fn default_talk_port() -> u16 {
    DEFAULT_TALK_PORT
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            talk_port: DEFAULT_TALK_PORT,
        }
    }
}

/// Full relay configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub doorbell: DoorbellConfig,
    #[serde(default)]
    pub server: ServerSection,
    /// Stream name used by the upstream-reset helper (the `talk_enabled`
    /// camera's stream binding on the upstream media server).
    #[serde(default = "default_stream_name")]
    pub upstream_stream_name: String,
    /// Base URL of the upstream media server's HTTP API (e.g.
    /// `http://127.0.0.1:1984`).
    pub upstream_api_base: String,
}

fn default_stream_name() -> String {
    DEFAULT_UPSTREAM_STREAM_NAME.to_string()
}

impl RelayConfig {
    /// Parses and validates a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field found.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| format!("invalid config JSON: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates required fields are present and sane.
    pub fn validate(&self) -> Result<(), String> {
        if self.doorbell.ip.trim().is_empty() {
            return Err("doorbell.ip must not be empty".to_string());
        }
        if self.doorbell.username.trim().is_empty() {
            return Err("doorbell.username must not be empty".to_string());
        }
        if self.doorbell.rtsp_port == 0 {
            return Err("doorbell.rtsp_port must be nonzero".to_string());
        }
        if self.server.talk_port == 0 {
            return Err("server.talk_port must be nonzero".to_string());
        }
        if self.upstream_api_base.trim().is_empty() {
            return Err("upstream_api_base must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_JSON: &str = r#"{
        "doorbell": {
            "ip": "192.168.1.50",
            "username": "admin",
            "password": "secret"
        },
        "server": { "talk_port": 5001 },
        "upstream_api_base": "http://127.0.0.1:1984"
    }"#;

    #[test]
    fn parses_valid_config_with_defaults_filled_in() {
        let config = RelayConfig::from_json(VALID_JSON).expect("should parse");
        assert_eq!(config.doorbell.rtsp_port, DEFAULT_RTSP_PORT);
        assert_eq!(config.doorbell.path, DEFAULT_CAMERA_PATH);
        assert_eq!(config.doorbell.channel, DEFAULT_CAMERA_CHANNEL);
        assert_eq!(config.upstream_stream_name, DEFAULT_UPSTREAM_STREAM_NAME);
    }

    #[test]
    fn rejects_missing_doorbell_ip() {
        let json = r#"{
            "doorbell": {"ip": "", "username": "admin", "password": "secret"},
            "upstream_api_base": "http://127.0.0.1:1984"
        }"#;
        assert!(RelayConfig::from_json(json).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(RelayConfig::from_json("not json").is_err());
    }

    #[test]
    fn explicit_camera_fields_override_defaults() {
        let json = r#"{
            "doorbell": {
                "ip": "192.168.1.50", "username": "admin", "password": "secret",
                "path": "custom/path", "channel": 2
            },
            "upstream_api_base": "http://127.0.0.1:1984"
        }"#;
        let config = RelayConfig::from_json(json).unwrap();
        assert_eq!(config.doorbell.path, "custom/path");
        assert_eq!(config.doorbell.channel, 2);
    }
}
