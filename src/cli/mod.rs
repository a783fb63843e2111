mod auth;
mod fetch;
mod serve;
mod show;

use crate::config::{Config, ConsentMode};
use crate::credentials::{
    ConsentPolicy, CredentialSources, EnvBlobs, FileStore, GoogleAuthorizer, Provisioner,
};
use crate::error::Result;
use crate::sheets::{SheetFetcher, SheetTarget, SheetsClient};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use auth::AuthArgs;
pub use serve::ServeArgs;
pub use show::ShowResource;

type GoogleFetcher = SheetFetcher<FileStore, GoogleAuthorizer, SheetsClient>;

#[derive(Parser, Debug)]
#[command(name = "sheet-relay")]
#[command(about = "Serve a Google Sheets range as JSON", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of the XDG default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Serve(args) => args.execute(config).await,
            Commands::Fetch => fetch::execute(config).await,
            Commands::Auth(args) => args.execute(config).await,
            Commands::Show { resource } => resource.execute(&config).await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the data and index endpoints
    Serve(ServeArgs),
    /// Fetch the range once and print it as JSON
    Fetch,
    /// Run the OAuth consent flow and cache the token
    Auth(AuthArgs),
    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
}

/// Wire the file store, Google OAuth and the Sheets API together
fn google_fetcher(config: &Config, consent: ConsentPolicy) -> Result<GoogleFetcher> {
    let credentials = &config.credentials;
    let store = FileStore::new(credentials.client_secret_path(), credentials.token_path());
    let authorizer = GoogleAuthorizer::new(credentials.callback_port)?;

    let provisioner = Provisioner::new(
        store,
        authorizer,
        CredentialSources::new(credentials.sources.clone()),
        EnvBlobs::from_env(credentials),
        consent,
    );

    Ok(SheetFetcher::new(
        provisioner,
        SheetsClient::new()?,
        SheetTarget::from(&config.sheet),
    ))
}

fn consent_policy(config: &Config, interactive: bool, console: bool) -> ConsentPolicy {
    let mut policy = ConsentPolicy::from(&config.credentials);
    policy.interactive |= interactive;
    if console {
        policy.mode = ConsentMode::Console;
    }
    policy
}
