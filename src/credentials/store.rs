use crate::credentials::{ClientSecret, Token};
use crate::error::{AppError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persistence for the OAuth client secret and the cached token.
pub trait CredentialStore: Send + Sync {
    /// Location reported when a client secret is required but absent
    fn client_secret_location(&self) -> PathBuf;

    fn has_client_secret(&self) -> bool;

    fn load_client_secret(&self) -> Result<Option<ClientSecret>>;

    fn save_client_secret(&self, secret: &ClientSecret) -> Result<()>;

    /// Returns `None` when no token is stored or the stored one can't be parsed
    fn load_token(&self) -> Result<Option<Token>>;

    fn save_token(&self, token: &Token) -> Result<()>;

    fn clear_token(&self) -> Result<()>;
}

/// Stores credentials as JSON files in a single directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    client_secret_path: PathBuf,
    token_path: PathBuf,
}

impl FileStore {
    pub fn new(client_secret_path: PathBuf, token_path: PathBuf) -> Self {
        Self {
            client_secret_path,
            token_path,
        }
    }

    fn read_optional(path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| AppError::Auth(format!("Failed to read {:?}: {}", path, e)))?;
        Ok(Some(contents))
    }

    /// Write via a temp file and rename so readers never see a partial file
    fn write_private(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Auth(format!("Failed to create credentials directory: {}", e))
            })?;
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| AppError::Auth(format!("Invalid credentials path {:?}", path)))?;
        let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp_path)
            .map_err(|e| AppError::Auth(format!("Failed to create {:?}: {}", tmp_path, e)))?;

        file.write_all(contents.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| AppError::Auth(format!("Failed to write {:?}: {}", tmp_path, e)))?;

        fs::rename(&tmp_path, path)
            .map_err(|e| AppError::Auth(format!("Failed to replace {:?}: {}", path, e)))?;

        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn client_secret_location(&self) -> PathBuf {
        self.client_secret_path.clone()
    }

    fn has_client_secret(&self) -> bool {
        self.client_secret_path.exists()
    }

    fn load_client_secret(&self) -> Result<Option<ClientSecret>> {
        match Self::read_optional(&self.client_secret_path)? {
            Some(contents) => ClientSecret::from_json(&contents).map(Some),
            None => Ok(None),
        }
    }

    fn save_client_secret(&self, secret: &ClientSecret) -> Result<()> {
        Self::write_private(&self.client_secret_path, secret.as_json())?;
        debug!(path = ?self.client_secret_path, "Wrote client secret");
        Ok(())
    }

    fn load_token(&self) -> Result<Option<Token>> {
        let Some(contents) = Self::read_optional(&self.token_path)? else {
            return Ok(None);
        };

        match Token::parse(&contents) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(path = ?self.token_path, error = %e, "Ignoring unreadable token file");
                Ok(None)
            }
        }
    }

    fn save_token(&self, token: &Token) -> Result<()> {
        let contents = serde_json::to_string_pretty(token)?;
        Self::write_private(&self.token_path, &contents)?;
        debug!(path = ?self.token_path, "Saved token");
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        if !self.token_path.exists() {
            debug!("No cached token to clear");
            return Ok(());
        }

        fs::remove_file(&self.token_path)
            .map_err(|e| AppError::Auth(format!("Failed to delete token file: {}", e)))?;
        debug!(path = ?self.token_path, "Cleared cached token");

        Ok(())
    }
}
