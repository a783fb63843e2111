mod oauth;
mod provisioner;
mod sources;
mod store;
#[cfg(test)]
pub(crate) mod test_helpers;
mod types;

pub use oauth::GoogleAuthorizer;
pub use provisioner::{ConsentPolicy, Provisioner};
pub use sources::{CredentialSources, EnvBlobs};
pub use store::{CredentialStore, FileStore};
pub use types::{ClientSecret, Token};

use crate::config::ConsentMode;
use crate::error::Result;
use async_trait::async_trait;

/// Obtains tokens from the OAuth provider.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Exchange the token's refresh credential for a fresh access token
    async fn refresh(&self, secret: &ClientSecret, token: &Token) -> Result<Token>;

    /// Ask the user to grant access; blocks until they answer
    async fn consent(&self, secret: &ClientSecret, mode: ConsentMode) -> Result<Token>;
}
