use super::{Authorizer, ClientSecret, CredentialStore, Token};
use crate::config::ConsentMode;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) const CLIENT_SECRET_JSON: &str = r#"{"installed":{"client_id":"test-client.apps.googleusercontent.com","project_id":"test","auth_uri":"https://accounts.google.com/o/oauth2/auth","token_uri":"https://oauth2.googleapis.com/token","client_secret":"test-secret","redirect_uris":["http://localhost"]}}"#;

pub(crate) fn encode(raw: &str) -> String {
    STANDARD.encode(raw)
}

pub(crate) fn mock_client_secret() -> ClientSecret {
    ClientSecret::from_json(CLIENT_SECRET_JSON).unwrap()
}

pub(crate) fn mock_token(access: &str, refresh: Option<&str>, expiry: DateTime<Utc>) -> Token {
    Token {
        refresh_token: refresh.map(str::to_string),
        expiry: Some(expiry),
        ..Token::new(access)
    }
}

pub(crate) fn fresh_token(access: &str) -> Token {
    mock_token(access, Some("refresh"), Utc::now() + Duration::hours(1))
}

pub(crate) fn expired_token(access: &str, refresh: Option<&str>) -> Token {
    mock_token(access, refresh, Utc::now() - Duration::hours(1))
}

/// In-memory credential store; clones share state.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    pub client_secret: Arc<Mutex<Option<ClientSecret>>>,
    pub token: Arc<Mutex<Option<Token>>>,
    pub client_secret_writes: Arc<AtomicUsize>,
    pub token_writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub(crate) fn with(client_secret: Option<ClientSecret>, token: Option<Token>) -> Self {
        let store = Self::default();
        *store.client_secret.lock().unwrap() = client_secret;
        *store.token.lock().unwrap() = token;
        store
    }

    pub(crate) fn token(&self) -> Option<Token> {
        self.token.lock().unwrap().clone()
    }
}

impl CredentialStore for MemoryStore {
    fn client_secret_location(&self) -> PathBuf {
        PathBuf::from("memory://credentials.json")
    }

    fn has_client_secret(&self) -> bool {
        self.client_secret.lock().unwrap().is_some()
    }

    fn load_client_secret(&self) -> Result<Option<ClientSecret>> {
        Ok(self.client_secret.lock().unwrap().clone())
    }

    fn save_client_secret(&self, secret: &ClientSecret) -> Result<()> {
        self.client_secret_writes.fetch_add(1, Ordering::SeqCst);
        *self.client_secret.lock().unwrap() = Some(secret.clone());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<Token>> {
        Ok(self.token())
    }

    fn save_token(&self, token: &Token) -> Result<()> {
        self.token_writes.fetch_add(1, Ordering::SeqCst);
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

/// Authorizer that counts calls and hands out canned tokens.
#[derive(Clone, Default)]
pub(crate) struct MockAuthorizer {
    pub refresh_calls: Arc<AtomicUsize>,
    pub consent_calls: Arc<AtomicUsize>,
    pub fail_refresh: bool,
}

impl MockAuthorizer {
    pub(crate) fn failing_refresh() -> Self {
        Self {
            fail_refresh: true,
            ..Self::default()
        }
    }

    pub(crate) fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn consents(&self) -> usize {
        self.consent_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authorizer for MockAuthorizer {
    async fn refresh(&self, secret: &ClientSecret, token: &Token) -> Result<Token> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh {
            return Err(AppError::Auth("invalid_grant".to_string()));
        }

        Ok(Token {
            access_token: "refreshed-access".to_string(),
            expiry: Some(Utc::now() + Duration::hours(1)),
            ..token.clone()
        }
        .with_client(secret))
    }

    async fn consent(&self, secret: &ClientSecret, _mode: ConsentMode) -> Result<Token> {
        self.consent_calls.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to pile up behind the provisioner
        tokio::task::yield_now().await;
        Ok(fresh_token("consented-access").with_client(secret))
    }
}
