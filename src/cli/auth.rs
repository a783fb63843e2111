use super::{consent_policy, google_fetcher};
use crate::config::Config;
use crate::error::Result;
use clap::Args;
use tracing::info;

#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Discard the cached token and ask for consent again
    #[arg(long)]
    pub reset: bool,

    /// Paste the authorization code instead of using a loopback listener
    #[arg(long)]
    pub console: bool,
}

impl AuthArgs {
    pub async fn execute(&self, config: Config) -> Result<()> {
        let consent = consent_policy(&config, true, self.console);
        let fetcher = google_fetcher(&config, consent)?;
        let provisioner = fetcher.provisioner();

        if self.reset {
            provisioner.clear_token()?;
        }

        let token = provisioner.provision().await?;
        info!(expiry = ?token.expiry, "Google Sheets authentication verified");

        Ok(())
    }
}
