use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use yup_oauth2::ApplicationSecret;

pub(crate) const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub(crate) const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_CERT_URL: &str = "https://www.googleapis.com/oauth2/v1/certs";

// Refresh a little before the real expiry so a request never races it
const EXPIRY_BUFFER_SECS: i64 = 300;

/// OAuth application credential as downloaded from the Google Cloud console.
///
/// The raw JSON is kept so the file can be written back exactly as provided.
#[derive(Debug, Clone)]
pub struct ClientSecret {
    secret: ApplicationSecret,
    raw: String,
}

impl ClientSecret {
    /// Parse a client secret file with an `installed` or `web` section
    pub fn from_json(raw: &str) -> Result<Self> {
        let secret = yup_oauth2::parse_application_secret(raw)
            .map_err(|e| AppError::Auth(format!("Invalid client secret: {}", e)))?;

        if secret.client_id.is_empty() {
            return Err(AppError::Auth(
                "Invalid client secret: empty client_id".to_string(),
            ));
        }

        Ok(Self {
            secret,
            raw: raw.to_string(),
        })
    }

    /// Rebuild a client secret from the OAuth client fields embedded in a token
    pub fn from_token(token: &Token) -> Option<Self> {
        let client_id = token.client_id.clone()?;
        let client_secret = token.client_secret.clone()?;

        let secret = ApplicationSecret {
            client_id,
            client_secret,
            auth_uri: GOOGLE_AUTH_URL.to_string(),
            token_uri: token
                .token_uri
                .clone()
                .unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            auth_provider_x509_cert_url: Some(GOOGLE_CERT_URL.to_string()),
            redirect_uris: vec!["http://localhost".to_string()],
            project_id: None,
            client_email: None,
            client_x509_cert_url: None,
        };
        let raw = serde_json::json!({
            "installed": {
                "client_id": &secret.client_id,
                "client_secret": &secret.client_secret,
                "auth_uri": &secret.auth_uri,
                "token_uri": &secret.token_uri,
                "redirect_uris": &secret.redirect_uris,
            }
        })
        .to_string();

        Some(Self { secret, raw })
    }

    pub fn client_id(&self) -> &str {
        &self.secret.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.secret.client_secret
    }

    pub fn auth_uri(&self) -> &str {
        &self.secret.auth_uri
    }

    pub fn token_uri(&self) -> &str {
        &self.secret.token_uri
    }

    pub fn as_json(&self) -> &str {
        &self.raw
    }
}

/// Cached OAuth token, stored in Google's "authorized user" layout so files
/// written by other Google client libraries load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expiry: None,
            scopes: Vec::new(),
            token_uri: None,
            client_id: None,
            client_secret: None,
        }
    }

    /// Record which OAuth client minted this token so it can be refreshed
    /// without the client secret file.
    pub fn with_client(mut self, secret: &ClientSecret) -> Self {
        self.token_uri = Some(secret.token_uri().to_string());
        self.client_id = Some(secret.client_id().to_string());
        self.client_secret = Some(secret.client_secret().to_string());
        self
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry < now + Duration::seconds(EXPIRY_BUFFER_SECS),
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}
