//! Centralized error types for the AVA Talk relay core.
//!
//! Defines structured error types using `thiserror` and a local `ErrorCode`
//! trait so every error variant carries a machine-readable code, the same
//! pattern the rest of this codebase uses for its SOAP/discovery errors.

use thiserror::Error;

use crate::reset::ResetError;
use crate::rtsp::RtspConnectError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for logs and status messages.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the relay core.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),

    /// The RTSP backchannel handshake failed.
    #[error("backchannel connect failed: {0}")]
    Rtsp(#[from] RtspConnectError),

    /// The upstream-reset helper failed (always best-effort, never fatal).
    #[error("upstream reset failed: {0}")]
    Reset(#[from] ResetError),

    /// Low-level I/O error not otherwise classified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for RelayError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration_error",
            Self::Rtsp(e) => e.code(),
            Self::Reset(_) => "upstream_reset_failed",
            Self::Io(_) => "io_error",
        }
    }
}

/// Convenient Result alias for core operations.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_has_stable_code() {
        let err = RelayError::Config("missing doorbell.ip".to_string());
        assert_eq!(err.code(), "configuration_error");
    }

    #[test]
    fn rtsp_error_code_delegates_to_inner() {
        use crate::rtsp::ConnectErrorKind;
        let inner = RtspConnectError {
            kind: ConnectErrorKind::Describe404,
            message: "not found".to_string(),
        };
        let err: RelayError = inner.into();
        assert_eq!(err.code(), "rtsp_describe_404");
    }
}
