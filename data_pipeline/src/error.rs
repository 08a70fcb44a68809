// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised at the upstream provider boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status} for {ticker}")]
    Status { ticker: String, status: u16 },

    #[error("Invalid JSON from provider: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error for {ticker}: {message}")]
    Upstream { ticker: String, message: String },

    #[error("No data returned for {0}")]
    NoData(String),

    #[error("Could not obtain a session crumb (status {0})")]
    Crumb(u16),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
