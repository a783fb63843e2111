use crate::config::Config;
use crate::error::Result;
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum ShowResource {
    /// Show configuration and credential paths
    Paths,
}

impl ShowResource {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        match self {
            ShowResource::Paths => show_paths(config),
        }
    }
}

fn show_paths(config: &Config) -> Result<()> {
    let config_path = Config::config_file()?;
    let credentials = &config.credentials;

    info!(path = ?config_path, "Config path");
    info!(path = ?credentials.dir, "Credentials directory");
    info!(path = ?credentials.client_secret_path(), "Client secret path");
    info!(path = ?credentials.token_path(), "Token path");

    Ok(())
}
