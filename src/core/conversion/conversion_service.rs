// Batch driver: walks every supported Google format, converts each file it
// finds and keeps a running tally. This is what `main` calls on every tick.

use super::conversion_engine::{convert_file, ConversionContext, ConversionError};
use super::conversion_models::FolderPolicy;
use super::drive_store::{DriveStore, ExportTransport, TokenSource};
use super::format_catalog::FormatCatalog;

/// Outcome of one pass over the user's files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Source files listed across all supported types.
    pub files_seen: usize,
    /// Files that could not be prepared for conversion at all.
    pub files_skipped: usize,
    /// New Office copies created.
    pub converted: usize,
}

pub struct ConversionService<D, E, K> {
    drive: D,
    exporter: E,
    tokens: K,
    policy: FolderPolicy,
}

impl<D, E, K> ConversionService<D, E, K>
where
    D: DriveStore,
    E: ExportTransport,
    K: TokenSource,
{
    pub fn new(drive: D, exporter: E, tokens: K, policy: FolderPolicy) -> Self {
        Self {
            drive,
            exporter,
            tokens,
            policy,
        }
    }

    /// Converts every supported file the effective user can see.
    ///
    /// Failing to identify the user or to list a file type aborts the pass.
    /// A file that cannot be prepared is logged and skipped; per-folder
    /// failures are already absorbed by the engine.
    pub async fn run_once(&self) -> Result<ConversionSummary, ConversionError> {
        let user = self.drive.current_user().await?;
        tracing::info!("Starting conversion to office for all files for {}", user);

        let ctx = ConversionContext {
            drive: &self.drive,
            exporter: &self.exporter,
            tokens: &self.tokens,
            user: &user,
            policy: self.policy,
        };

        let mut summary = ConversionSummary::default();

        for mime_type in FormatCatalog::supported_native_types() {
            let files = self.drive.list_files_by_mime_type(mime_type).await?;
            tracing::debug!(mime_type, count = files.len(), "Listed files");

            for file in files {
                summary.files_seen += 1;
                let file_id = file.id.clone();
                let file_name = file.name.clone();

                match convert_file(ctx, file).await {
                    Ok(created) => summary.converted += created.len(),
                    Err(e) => {
                        summary.files_skipped += 1;
                        tracing::warn!(file_id = %file_id, "Skipping {}: {}", file_name, e);
                    }
                }
            }
        }

        tracing::info!("Converted {} files total", summary.converted);
        Ok(summary)
    }
}
