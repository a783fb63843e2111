use super::SheetOperations;
use crate::config::SheetConfig;
use crate::credentials::{Authorizer, CredentialStore, Provisioner};
use crate::error::Result;
use crate::models::SheetRow;
use async_trait::async_trait;
use tracing::{instrument, warn};

/// Spreadsheet and A1 range served by the data endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    pub spreadsheet_id: String,
    pub range: String,
}

impl From<&SheetConfig> for SheetTarget {
    fn from(config: &SheetConfig) -> Self {
        Self {
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.range.clone(),
        }
    }
}

#[async_trait]
pub trait RowSource: Send + Sync {
    /// Fetch the rows, surfacing API failures as `AppError::Sheets`
    async fn fetch_rows(&self) -> Result<Vec<SheetRow>>;

    /// Fetch the rows, treating API failures as an empty sheet.
    ///
    /// Provisioning failures still propagate.
    async fn fetch_rows_or_empty(&self) -> Result<Vec<SheetRow>> {
        match self.fetch_rows().await {
            Err(e) if e.is_upstream() => {
                warn!(error = %e, "Spreadsheet read failed, returning no rows");
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

pub struct SheetFetcher<S, A, SC> {
    provisioner: Provisioner<S, A>,
    sheets_client: SC,
    target: SheetTarget,
}

impl<S, A, SC> SheetFetcher<S, A, SC>
where
    S: CredentialStore,
    A: Authorizer,
    SC: SheetOperations,
{
    pub fn new(provisioner: Provisioner<S, A>, sheets_client: SC, target: SheetTarget) -> Self {
        Self {
            provisioner,
            sheets_client,
            target,
        }
    }

    pub fn provisioner(&self) -> &Provisioner<S, A> {
        &self.provisioner
    }
}

#[async_trait]
impl<S, A, SC> RowSource for SheetFetcher<S, A, SC>
where
    S: CredentialStore,
    A: Authorizer,
    SC: SheetOperations,
{
    #[instrument(name = "Fetching rows", skip_all, fields(range = %self.target.range))]
    async fn fetch_rows(&self) -> Result<Vec<SheetRow>> {
        let token = self.provisioner.provision().await?;

        self.sheets_client
            .read_values(
                &token.access_token,
                &self.target.spreadsheet_id,
                &self.target.range,
            )
            .await
    }
}
