use super::{Authorizer, ClientSecret, CredentialSources, CredentialStore, EnvBlobs, Token};
use crate::config::{ConsentMode, CredentialSource, CredentialsConfig};
use crate::error::{AppError, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Whether, and how, the user may be asked to grant access.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsentPolicy {
    pub interactive: bool,
    pub mode: ConsentMode,
}

impl From<&CredentialsConfig> for ConsentPolicy {
    fn from(config: &CredentialsConfig) -> Self {
        Self {
            interactive: config.interactive,
            mode: config.consent_mode,
        }
    }
}

/// Produces a usable access token, seeding the store from the environment,
/// refreshing, or running consent as needed.
pub struct Provisioner<S, A> {
    store: S,
    authorizer: A,
    sources: CredentialSources,
    env: EnvBlobs,
    consent: ConsentPolicy,
    // Only one caller may refresh or run consent at a time
    lock: Mutex<()>,
}

impl<S, A> Provisioner<S, A>
where
    S: CredentialStore,
    A: Authorizer,
{
    pub fn new(
        store: S,
        authorizer: A,
        sources: CredentialSources,
        env: EnvBlobs,
        consent: ConsentPolicy,
    ) -> Self {
        Self {
            store,
            authorizer,
            sources,
            env,
            consent,
            lock: Mutex::new(()),
        }
    }

    /// Return a valid token, persisting it if it had to be refreshed or minted
    #[instrument(name = "Provisioning credentials", skip_all)]
    pub async fn provision(&self) -> Result<Token> {
        let _guard = self.lock.lock().await;

        let secret = self.resolve_client_secret()?;
        let cached = self.resolve_token()?;

        let token = match cached {
            Some(token) if token.is_valid() => {
                debug!("Using cached token");
                return Ok(token);
            }
            Some(token) if token.can_refresh() => {
                debug!("Access token expired, refreshing...");
                self.refresh_or_consent(secret.as_ref(), &token).await?
            }
            Some(_) => {
                debug!("Access token expired without a refresh token");
                self.run_consent(secret.as_ref()).await?
            }
            None => {
                debug!("No cached token found");
                self.run_consent(secret.as_ref()).await?
            }
        };

        self.store.save_token(&token)?;
        Ok(token)
    }

    fn resolve_client_secret(&self) -> Result<Option<ClientSecret>> {
        for source in self.sources.iter() {
            match source {
                CredentialSource::LocalFile => {
                    if let Some(secret) = self.store.load_client_secret()? {
                        return Ok(Some(secret));
                    }
                }
                CredentialSource::EnvBase64 => {
                    if let Some(secret) = self.env.decode_client_secret()? {
                        if !self.store.has_client_secret() {
                            self.store.save_client_secret(&secret)?;
                            info!(
                                path = ?self.store.client_secret_location(),
                                "Wrote client secret from environment"
                            );
                        }
                        return Ok(Some(secret));
                    }
                }
            }
        }

        Ok(None)
    }

    fn resolve_token(&self) -> Result<Option<Token>> {
        for source in self.sources.iter() {
            match source {
                CredentialSource::LocalFile => {
                    if let Some(token) = self.store.load_token()? {
                        return Ok(Some(token));
                    }
                }
                CredentialSource::EnvBase64 => {
                    // The blob only seeds the store; a stored token is newer
                    if let Some(token) = self.store.load_token()? {
                        return Ok(Some(token));
                    }
                    let token = match self.env.decode_token() {
                        Ok(Some(token)) => token,
                        Ok(None) => continue,
                        Err(e) => {
                            warn!(error = %e, "Ignoring token from environment");
                            continue;
                        }
                    };
                    self.store.save_token(&token)?;
                    info!("Seeded token from environment");
                    return Ok(Some(token));
                }
            }
        }

        Ok(None)
    }

    async fn refresh_or_consent(
        &self,
        secret: Option<&ClientSecret>,
        token: &Token,
    ) -> Result<Token> {
        // The token may carry its own client fields, as tokens written by
        // Google's client libraries do
        let refresh_secret = match secret {
            Some(secret) => secret.clone(),
            None => ClientSecret::from_token(token).ok_or_else(|| {
                AppError::MissingClientSecret(self.store.client_secret_location())
            })?,
        };

        match self.authorizer.refresh(&refresh_secret, token).await {
            Ok(refreshed) => {
                debug!("Token refresh successful");
                Ok(refreshed)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, re-authenticating");
                self.run_consent(secret).await
            }
        }
    }

    async fn run_consent(&self, secret: Option<&ClientSecret>) -> Result<Token> {
        let secret = secret
            .ok_or_else(|| AppError::MissingClientSecret(self.store.client_secret_location()))?;

        if !self.consent.interactive {
            return Err(AppError::ConsentRequired);
        }

        info!(mode = ?self.consent.mode, "Starting OAuth consent flow");
        self.authorizer.consent(secret, self.consent.mode).await
    }

    /// Forget the cached token so the next provisioning runs consent
    pub fn clear_token(&self) -> Result<()> {
        self.store.clear_token()
    }
}
