use super::SheetOperations;
use crate::error::{AppError, Result};
use crate::models::SheetRow;
use async_trait::async_trait;
use google_sheets4::api::{Scope, Sheets};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use tracing::{debug, instrument};

type HttpsClient = google_sheets4::common::Client<HttpsConnector<HttpConnector>>;

pub struct SheetsClient {
    client: HttpsClient,
}

impl SheetsClient {
    pub fn new() -> Result<Self> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| AppError::Sheets(format!("Failed to load native TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);

        Ok(Self { client })
    }

    /// Build a hub authorized with an already provisioned access token.
    ///
    /// Clones share the connection pool.
    fn hub(&self, access_token: &str) -> Sheets<HttpsConnector<HttpConnector>> {
        Sheets::new(self.client.clone(), access_token.to_string())
    }
}

#[async_trait]
impl SheetOperations for SheetsClient {
    #[instrument(name = "Reading spreadsheet values", skip(self, access_token))]
    async fn read_values(
        &self,
        access_token: &str,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<SheetRow>> {
        let (_, response) = self
            .hub(access_token)
            .spreadsheets()
            .values_get(spreadsheet_id, range)
            .major_dimension("ROWS")
            .value_render_option("FORMATTED_VALUE")
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(|e| AppError::Sheets(format!("Failed to read range '{}': {}", range, e)))?;

        // Values are Option<Vec<Vec<serde_json::Value>>>, absent for an empty range
        let rows: Vec<SheetRow> = response
            .values
            .unwrap_or_default()
            .into_iter()
            .map(SheetRow::from_values)
            .collect();
        debug!(rows = rows.len(), "Read spreadsheet values");

        Ok(rows)
    }
}
