use super::{consent_policy, google_fetcher};
use crate::config::Config;
use crate::error::Result;
use crate::server::HttpServer;
use clap::Args;
use tracing::info;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on, overriding the config
    #[arg(long)]
    pub bind: Option<String>,

    /// Allow the OAuth consent flow to run when a request needs a new token
    #[arg(long)]
    pub interactive: bool,
}

impl ServeArgs {
    pub async fn execute(&self, config: Config) -> Result<()> {
        let consent = consent_policy(&config, self.interactive, false);
        let fetcher = google_fetcher(&config, consent)?;
        let bind = self.bind.as_deref().unwrap_or(&config.server.bind);

        let server = HttpServer::bind(bind, fetcher, config.server.on_api_error)?;
        let shutdown = server.shutdown_handle();

        tokio::select! {
            result = server.run() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                shutdown.shutdown();
                Ok(())
            }
        }
    }
}
