//! Error types for Compass

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid turn: {0}")]
    InvalidTurn(String),

    #[error("completion error: {provider} - {message}")]
    Completion { provider: String, message: String },

    #[error("store error: {store} - {message}")]
    Store { store: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_turn(reason: impl Into<String>) -> Self {
        Self::InvalidTurn(reason.into())
    }

    pub fn completion(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Completion {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Whether the turn can still produce a reply after this error.
    pub fn is_turn_fatal(&self) -> bool {
        matches!(self, Self::InvalidTurn(_) | Self::Completion { .. })
    }
}
