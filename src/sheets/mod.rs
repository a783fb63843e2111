mod client;
mod fetcher;

pub use client::SheetsClient;
#[cfg(test)]
pub(crate) use fetcher::mocks;
pub use fetcher::{RowSource, SheetFetcher, SheetTarget};

use crate::error::Result;
use crate::models::SheetRow;
use async_trait::async_trait;

#[async_trait]
pub trait SheetOperations: Send + Sync {
    /// Read a range in row-major order
    async fn read_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<SheetRow>>;
}
