use crate::config::{CredentialSource, CredentialsConfig};
use crate::credentials::{ClientSecret, Token};
use crate::error::{AppError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Base64 credential blobs captured from the environment at startup.
#[derive(Debug, Clone, Default)]
pub struct EnvBlobs {
    pub client_secret: Option<String>,
    pub token: Option<String>,
}

impl EnvBlobs {
    /// Read the variables named in the config; empty values count as unset
    pub fn from_env(config: &CredentialsConfig) -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            client_secret: read(&config.client_secret_env),
            token: read(&config.token_env),
        }
    }

    pub fn decode_client_secret(&self) -> Result<Option<ClientSecret>> {
        let Some(blob) = &self.client_secret else {
            return Ok(None);
        };
        let json = decode_blob(blob)?;
        ClientSecret::from_json(&json)
            .map(Some)
            .map_err(|e| AppError::CredentialDecode(e.to_string()))
    }

    pub fn decode_token(&self) -> Result<Option<Token>> {
        let Some(blob) = &self.token else {
            return Ok(None);
        };
        let json = decode_blob(blob)?;
        Token::parse(&json)
            .map(Some)
            .map_err(|e| AppError::CredentialDecode(format!("Invalid token: {}", e)))
    }
}

/// Enabled credential sources in precedence order.
#[derive(Debug, Clone)]
pub struct CredentialSources {
    order: Vec<CredentialSource>,
}

impl CredentialSources {
    pub fn new(order: Vec<CredentialSource>) -> Self {
        Self { order }
    }

    pub fn iter(&self) -> impl Iterator<Item = CredentialSource> + '_ {
        self.order.iter().copied()
    }
}

impl Default for CredentialSources {
    fn default() -> Self {
        Self::new(CredentialsConfig::default().sources)
    }
}

fn decode_blob(blob: &str) -> Result<String> {
    let compact: String = blob.split_whitespace().collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AppError::CredentialDecode(format!("Invalid base64: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::CredentialDecode(format!("Invalid UTF-8: {}", e)))
}
