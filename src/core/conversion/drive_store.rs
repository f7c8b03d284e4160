// Ports the conversion core needs from the outside world.
// The infra layer provides the Google Drive implementations; tests provide
// in-memory ones.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::conversion_models::{DriveFile, DriveFolder, ExportResponse, FileContent, PermissionLevel};

/// Errors raised by the storage provider, export transport or token source.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Drive API error: {0}")]
    Api(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Failed to decode Drive response: {0}")]
    Decode(String),
}

/// The file-storage operations the engine relies on.
///
/// Every listing call returns a fully drained, finite sequence.
#[async_trait]
pub trait DriveStore: Send + Sync {
    async fn list_files_by_mime_type(&self, mime_type: &str) -> Result<Vec<DriveFile>, DriveError>;

    /// Folders containing `file`, in provider order.
    async fn list_parents(&self, file: &DriveFile) -> Result<Vec<DriveFolder>, DriveError>;

    /// Files in `folder` whose name is exactly `name`.
    async fn list_files_by_name(
        &self,
        folder: &DriveFolder,
        name: &str,
    ) -> Result<Vec<DriveFile>, DriveError>;

    /// Access `principal` has on the file or folder with id `item_id`.
    async fn get_permission(
        &self,
        principal: &str,
        item_id: &str,
    ) -> Result<PermissionLevel, DriveError>;

    async fn create_file(
        &self,
        folder: &DriveFolder,
        content: FileContent,
    ) -> Result<DriveFile, DriveError>;

    async fn rename_file(&self, file: &DriveFile, name: &str) -> Result<DriveFile, DriveError>;

    /// Identifier (email address) of the user the batch runs as.
    async fn current_user(&self) -> Result<String, DriveError>;
}

/// Fetches an exported rendition of a file.
///
/// Implementations return non-2xx responses as an [`ExportResponse`] rather
/// than an error; only a failure to talk to the server at all is an `Err`.
#[async_trait]
pub trait ExportTransport: Send + Sync {
    async fn export_file(
        &self,
        file_id: &str,
        target_mime_type: &str,
        bearer_token: &str,
    ) -> Result<ExportResponse, DriveError>;
}

/// Hands out bearer tokens. Asked once per export.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> Result<String, DriveError>;
}

// Lets the Drive client and the engine share one token source.
#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn bearer_token(&self) -> Result<String, DriveError> {
        (**self).bearer_token().await
    }
}
