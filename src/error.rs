//! Error types for the monitor

use thiserror::Error;

/// Errors produced by the copy-trading monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid wallet address: {0}")]
    InvalidWallet(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Data API error: {0}")]
    DataApi(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
