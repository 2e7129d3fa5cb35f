//! Error types for the SpendLens client.
//!
//! Two families live here:
//!
//! - [`SpendError`]: local failures (storage, configuration, serialization).
//! - [`GatewayError`]: the outcome taxonomy of a backend call, shared by the
//!   request gateway, the upload orchestrator, and the analysis normalizer.

use std::fmt;
use thiserror::Error;

/// Text format of a persisted or transmitted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Toml,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Json => write!(f, "JSON"),
            DataFormat::Toml => write!(f, "TOML"),
        }
    }
}

/// Local failure: disk, credential file, config file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpendError {
    #[error("IO error: {message}")]
    Io { message: String },

    /// The credential or config file could not be locked, written, or removed.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to process {format} document: {message}")]
    Serialization { format: DataFormat, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpendError {
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    fn serialization(format: DataFormat, err: impl fmt::Display) -> Self {
        Self::Serialization {
            format,
            message: err.to_string(),
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<std::io::Error> for SpendError {
    fn from(err: std::io::Error) -> Self {
        Self::io(format!("{} ({:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for SpendError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(DataFormat::Json, err)
    }
}

impl From<toml::de::Error> for SpendError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization(DataFormat::Toml, err)
    }
}

impl From<toml::ser::Error> for SpendError {
    fn from(err: toml::ser::Error) -> Self {
        Self::serialization(DataFormat::Toml, err)
    }
}

pub type Result<T> = std::result::Result<T, SpendError>;

/// Outcome taxonomy of a call against the backend API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No session is present; the request was never sent.
    #[error("Not logged in")]
    Unauthenticated,

    /// The server rejected the session credentials (HTTP 401).
    #[error("Session expired, please log in again")]
    Unauthorized,

    /// The request was well-formed but refused (validation, business rule).
    #[error("Request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// Transport or network failure; no response was received.
    #[error("Server unreachable: {message}")]
    Unreachable { message: String },

    /// The server response violates the expected data contract.
    #[error("Invalid response shape: {message}")]
    InvalidShape { message: String },
}

impl GatewayError {
    pub fn rejected(status: u16, detail: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            detail: detail.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::InvalidShape {
            message: message.into(),
        }
    }

    /// Whether a manual retry of the same request could succeed.
    ///
    /// Only transport failures qualify. Malformed payloads are a data-contract
    /// violation and rejections will repeat.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// Whether the session was dropped as a consequence of this error.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Please log in first".to_string(),
            Self::Unauthorized => "Your session has expired, please log in again".to_string(),
            Self::Rejected { detail, .. } => detail.clone(),
            Self::Unreachable { .. } => {
                "Could not reach the server, please try again".to_string()
            }
            Self::InvalidShape { .. } => "The server returned an unexpected response".to_string(),
        }
    }
}
