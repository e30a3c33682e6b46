//! Server bootstrap configuration.
//!
//! Supports loading the relay configuration from a JSON file with
//! environment variable overrides, per the admin config store's schema.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ava_talk_core::RelayConfig;

/// Loads the relay configuration from a JSON file, then applies
/// environment overrides for the fields operators most commonly need to
/// change without editing the config store.
pub fn load(path: Option<&Path>, port_override: Option<u16>) -> Result<RelayConfig> {
    let path = path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/ava-talk/config.json"));

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let mut config = RelayConfig::from_json(&raw)
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    if let Ok(val) = std::env::var("AVA_TALK_DOORBELL_IP") {
        config.doorbell.ip = val;
    }
    if let Ok(val) = std::env::var("AVA_TALK_DOORBELL_PASSWORD") {
        config.doorbell.password = val;
    }
    if let Some(port) = port_override {
        config.server.talk_port = port;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("relay configuration failed validation")?;

    Ok(config)
}

/// Cert/key pair the WebSocket listener should terminate TLS with, if both
/// files exist. Absent either file, the caller falls back to plain WS (§6).
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl TlsPaths {
    /// Resolves the well-known cert/key location next to the config file:
    /// `<config_dir>/ssl/ava-admin.{crt,key}`, the same pair the admin
    /// surface's SSL certificate provisioning (out of scope here, §1)
    /// generates for the LAN-facing HTTPS admin UI. The relay only ever
    /// reads these files; it never provisions them.
    #[must_use]
    pub fn well_known(config_path: &Path) -> Self {
        let ssl_dir = config_path
            .parent()
            .map(|dir| dir.join("ssl"))
            .unwrap_or_else(|| PathBuf::from("ssl"));
        Self {
            cert: ssl_dir.join("ava-admin.crt"),
            key: ssl_dir.join("ava-admin.key"),
        }
    }

    /// Applies explicit CLI/env overrides on top of the well-known paths.
    #[must_use]
    pub fn with_overrides(mut self, cert: Option<PathBuf>, key: Option<PathBuf>) -> Self {
        if let Some(cert) = cert {
            self.cert = cert;
        }
        if let Some(key) = key {
            self.key = key;
        }
        self
    }

    /// Whether both the cert and key files exist on disk.
    #[must_use]
    pub fn available(&self) -> bool {
        self.cert.is_file() && self.key.is_file()
    }
}

#[cfg(test)]
mod tls_tests {
    use super::*;

    #[test]
    fn well_known_paths_sit_next_to_config_file() {
        let paths = TlsPaths::well_known(Path::new("/etc/ava-talk/config.json"));
        assert_eq!(paths.cert, PathBuf::from("/etc/ava-talk/ssl/ava-admin.crt"));
        assert_eq!(paths.key, PathBuf::from("/etc/ava-talk/ssl/ava-admin.key"));
    }

    #[test]
    fn missing_files_are_not_available() {
        let paths = TlsPaths::well_known(Path::new("/nonexistent/config.json"));
        assert!(!paths.available());
    }

    #[test]
    fn overrides_replace_well_known_paths() {
        let paths = TlsPaths::well_known(Path::new("/etc/ava-talk/config.json"))
            .with_overrides(Some(PathBuf::from("/custom/cert.pem")), None);
        assert_eq!(paths.cert, PathBuf::from("/custom/cert.pem"));
        assert_eq!(paths.key, PathBuf::from("/etc/ava-talk/ssl/ava-admin.key"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_reads_and_validates_a_config_file() {
        let mut file = tempfile_with_json(
            r#"{
                "doorbell": {"ip": "192.168.1.50", "username": "admin", "password": "secret"},
                "upstream_api_base": "http://127.0.0.1:1984"
            }"#,
        );
        let config = load(Some(file.path()), None).expect("should load");
        assert_eq!(config.doorbell.ip, "192.168.1.50");
        file.flush().ok();
    }

    #[test]
    fn load_fails_on_missing_file() {
        let result = load(Some(Path::new("/nonexistent/config.json")), None);
        assert!(result.is_err());
    }

    fn tempfile_with_json(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write temp file");
        file
    }
}
