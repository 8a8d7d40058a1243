//! Error types for the Scena workspace.

use thiserror::Error;

/// A shared error type for the entire Scena workspace.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug)]
pub enum ScenaError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Cards document parse error (fatal before any simulation starts)
    #[error("Card parse error: {0}")]
    CardParse(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error from a chat-completion endpoint.
    ///
    /// Agent calls are never retried; this propagates to the calling layer,
    /// which decides whether to abort, substitute a default, or score zero.
    #[error("Transport error{}: {message}", status_code.map(|c| format!(" ({c})")).unwrap_or_default())]
    Transport {
        status_code: Option<u16>,
        message: String,
    },

    /// Session execution error
    #[error("Execution error: {0}")]
    Execution(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScenaError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a CardParse error
    pub fn card_parse(message: impl Into<String>) -> Self {
        Self::CardParse(message.into())
    }

    /// Creates a Transport error without an HTTP status
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status_code: None,
            message: message.into(),
        }
    }

    /// Creates an Execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a transport error
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if this is a cards-document parse error
    pub fn is_card_parse(&self) -> bool {
        matches!(self, Self::CardParse(_))
    }
}

impl From<std::io::Error> for ScenaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ScenaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ScenaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ScenaError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, ScenaError>`.
pub type Result<T> = std::result::Result<T, ScenaError>;
