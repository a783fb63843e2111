use super::{consent_policy, google_fetcher};
use crate::config::{ApiErrorPolicy, Config};
use crate::error::Result;
use crate::sheets::RowSource;
use tracing::info;

pub async fn execute(config: Config) -> Result<()> {
    let consent = consent_policy(&config, false, false);
    let fetcher = google_fetcher(&config, consent)?;

    let rows = match config.server.on_api_error {
        ApiErrorPolicy::Empty => fetcher.fetch_rows_or_empty().await?,
        ApiErrorPolicy::Error => fetcher.fetch_rows().await?,
    };
    info!(rows = rows.len(), "Fetched rows");

    println!("{}", serde_json::to_string_pretty(&rows)?);

    Ok(())
}
