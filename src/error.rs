use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Google Sheets API error: {0}")]
    Sheets(String),

    #[error("OAuth2 authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Client secret not found at {0:?} and no environment source provided one")]
    MissingClientSecret(PathBuf),

    #[error("OAuth consent is required but interactive consent is disabled")]
    ConsentRequired,

    #[error("Failed to decode credential from environment: {0}")]
    CredentialDecode(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Errors reported by the remote spreadsheet API, as opposed to local
    /// provisioning failures.
    pub fn is_upstream(&self) -> bool {
        matches!(self, AppError::Sheets(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
