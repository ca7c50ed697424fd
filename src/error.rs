use std::io;

use thiserror::Error;

use crate::backend::BackendType;

/// Errors returned by the dispatcher and every backend.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration: no directory, unknown backend,
    /// no passphrase source.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("the specified item could not be found in the keyring: {key}")]
    NotFound { key: String },

    /// Decryption or authentication of a present item failed.
    #[error("failed to decrypt item {key}: {reason}")]
    Crypto { key: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("specified keyring backend not available")]
    NoAvailableImplementation,

    #[error("operation not supported by the {0} backend")]
    Unsupported(BackendType),

    #[error("failed to serialize item: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Opaque failure reported by an external store.
    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn not_found(key: &str) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }
}
