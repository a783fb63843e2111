use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR_PREFIX: &str = "sheet-relay";

pub const DEFAULT_SPREADSHEET_ID: &str = "1CrYexLUTGyIStFdVUzrdJ8tKOFjcC56JuW4FCipxbB0";
pub const DEFAULT_RANGE: &str = "Form responses 1!A1:T1000";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub sheet: SheetConfig,
    pub credentials: CredentialsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    /// A1 notation, e.g. `Sheet1!A1:T1000`
    pub range: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: DEFAULT_SPREADSHEET_ID.to_string(),
            range: DEFAULT_RANGE.to_string(),
        }
    }
}

/// Where OAuth credentials may come from.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialSource {
    LocalFile,
    EnvBase64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConsentMode {
    /// Listen on a loopback port for the OAuth redirect
    #[default]
    LocalServer,
    /// Print the URL and read the code from stdin
    Console,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub dir: PathBuf,
    pub client_secret_file: String,
    pub token_file: String,
    /// Enabled sources, highest precedence first
    pub sources: Vec<CredentialSource>,
    pub client_secret_env: String,
    pub token_env: String,
    pub interactive: bool,
    pub consent_mode: ConsentMode,
    /// Loopback port for the consent callback, 0 picks a free one
    pub callback_port: u16,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("credentials"),
            client_secret_file: "credentials.json".to_string(),
            token_file: "token.json".to_string(),
            sources: vec![CredentialSource::LocalFile, CredentialSource::EnvBase64],
            client_secret_env: "GOOGLE_CLIENT_SECRET_BASE64".to_string(),
            token_env: "GOOGLE_TOKEN_BASE64".to_string(),
            interactive: false,
            consent_mode: ConsentMode::LocalServer,
            callback_port: 0,
        }
    }
}

impl CredentialsConfig {
    pub fn client_secret_path(&self) -> PathBuf {
        self.dir.join(&self.client_secret_file)
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join(&self.token_file)
    }
}

/// What the data endpoint does when the spreadsheet API call fails.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ApiErrorPolicy {
    /// Log the failure and answer `200 []`
    #[default]
    Empty,
    /// Answer `502` with the error message
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub on_api_error: ApiErrorPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            on_api_error: ApiErrorPolicy::Empty,
        }
    }
}

impl Config {
    /// Load from an explicit path, or from the XDG config file when present.
    ///
    /// Without an explicit path a missing file is not an error: the defaults
    /// describe a working deployment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file not found at {:?}",
                        path
                    )));
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = Self::config_file()?;
                match default_path.exists() {
                    true => Self::from_file(&default_path)?,
                    false => Config::default(),
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.sheet.spreadsheet_id.is_empty() || self.sheet.range.is_empty() {
            return Err(AppError::Config(
                "sheet.spreadsheet_id and sheet.range must not be empty".to_string(),
            ));
        }

        if self.credentials.sources.is_empty() {
            return Err(AppError::Config(
                "credentials.sources must enable at least one source".to_string(),
            ));
        }

        Ok(())
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Self::xdg_dirs()
            .place_config_file("config.toml")
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }
}
