// Entry point of the Drive -> Office converter.
//
// **Architecture Overview:**
// - `core/` = Conversion decisions (platform-agnostic, talks to traits only)
// - `infra/` = Google Drive implementations of those traits
//
// This file's job is to:
// 1. Load configuration
// 2. Build the token source and Drive adapters (dependency injection)
// 3. Run the batch once, or on a fixed interval

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use crate::core::conversion::{ConversionService, ConverterConfig, TokenSource};
use crate::infra::drive::{DriveApiClient, HttpExportTransport, ServiceAccountAuth, StaticToken};

/// Picks the token source from the environment. A host-provided token wins
/// over service account credentials.
async fn token_source_from_env() -> anyhow::Result<Arc<dyn TokenSource>> {
    if let Ok(token) = std::env::var("GOOGLE_OAUTH_TOKEN") {
        if !token.trim().is_empty() {
            tracing::info!("Using bearer token from GOOGLE_OAUTH_TOKEN");
            return Ok(Arc::new(StaticToken::new(token.trim())));
        }
    }

    match ServiceAccountAuth::from_env()
        .await
        .context("Failed to load service account credentials")?
    {
        Some(auth) => {
            tracing::info!("Using service account credentials");
            Ok(Arc::new(auth))
        }
        None => bail!(
            "No credentials found. Set GOOGLE_OAUTH_TOKEN, GOOGLE_SERVICE_ACCOUNT_KEY \
             or GOOGLE_SERVICE_ACCOUNT_JSON."
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ConverterConfig::from_env().context("Invalid converter configuration")?;
    tracing::debug!(?config, "Loaded configuration");

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // The Drive client and the engine share one token source so a refreshed
    // service account token is reused by both.

    let tokens = token_source_from_env().await?;
    let drive = DriveApiClient::new(&config.api_base_url, Arc::clone(&tokens));
    let exporter = HttpExportTransport::new(&config.api_base_url);
    let service = ConversionService::new(drive, exporter, tokens, config.folder_policy());

    let Some(interval) = config.interval else {
        let summary = service.run_once().await?;
        tracing::info!(
            files_seen = summary.files_seen,
            files_skipped = summary.files_skipped,
            converted = summary.converted,
            "Conversion pass finished"
        );
        return Ok(());
    };

    tracing::info!("Running a conversion pass every {}s", interval.as_secs());
    loop {
        match service.run_once().await {
            Ok(summary) => tracing::info!(
                files_seen = summary.files_seen,
                files_skipped = summary.files_skipped,
                converted = summary.converted,
                "Conversion pass finished"
            ),
            Err(e) => tracing::warn!("Conversion pass failed: {}", e),
        }

        tokio::time::sleep(interval).await;
    }
}
