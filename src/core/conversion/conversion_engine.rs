// The conversion decision engine.
//
// One engine is built per Google-format source file. Building it resolves the
// Office target (name + mime type) and the folders the user may write the
// copy into. `convert()` then visits those folders one at a time, skips any
// folder that already holds a fresh enough copy, and otherwise exports the
// source and drops the result into the folder.
//
// Per-folder failures are logged and swallowed so one broken folder never
// stops the others. Construction failures propagate to the caller.

use thiserror::Error;

use super::conversion_models::{DriveFile, DriveFolder, FileContent, FolderPolicy};
use super::drive_store::{DriveError, DriveStore, ExportTransport, TokenSource};
use super::format_catalog::{ConversionDirection, FormatCatalog, FormatMapping};
use chrono::{DateTime, Utc};

const REVERSE_CONVERSION: &str = "conversion from Office formats to Google formats";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("File {name} ({id}) has unsupported MIME type {mime_type}")]
    UnsupportedFormat {
        id: String,
        name: String,
        mime_type: String,
    },

    #[error("File {name} ({id}) has unexpected MIME type {mime_type}, was expecting {expected}")]
    UnexpectedMimeType {
        id: String,
        name: String,
        mime_type: String,
        expected: &'static str,
    },

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Export did not produce a file (HTTP {status})")]
    ExportRejected { status: u16 },

    #[error(transparent)]
    Drive(#[from] DriveError),
}

impl ConversionError {
    fn unsupported(file: &DriveFile) -> Self {
        ConversionError::UnsupportedFormat {
            id: file.id.clone(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
        }
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Everything an engine borrows from its caller: the provider ports, the
/// effective user and the folder policy.
pub struct ConversionContext<'a, D, E, K> {
    pub drive: &'a D,
    pub exporter: &'a E,
    pub tokens: &'a K,
    pub user: &'a str,
    pub policy: FolderPolicy,
}

// Manual impls: derive would demand `D: Copy` and friends.
impl<D, E, K> Clone for ConversionContext<'_, D, E, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D, E, K> Copy for ConversionContext<'_, D, E, K> {}

/// A candidate copy is fresh when it was modified at or after the source.
/// Ties count as fresh so equal timestamps never trigger a reconversion.
pub fn is_fresh_copy(candidate: DateTime<Utc>, source: DateTime<Utc>) -> bool {
    candidate >= source
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct ConversionEngine<'a, D, E, K> {
    ctx: ConversionContext<'a, D, E, K>,
    source: DriveFile,
    mapping: &'static FormatMapping,
    target_file_name: String,
    eligible_folders: Vec<DriveFolder>,
}

impl<'a, D, E, K> ConversionEngine<'a, D, E, K>
where
    D: DriveStore,
    E: ExportTransport,
    K: TokenSource,
{
    /// Builds an engine for a Google-format file.
    ///
    /// Fails with [`ConversionError::UnsupportedFormat`] before touching the
    /// provider when the mime type is not a supported Google format.
    #[allow(dead_code)]
    pub async fn new(
        ctx: ConversionContext<'a, D, E, K>,
        source: DriveFile,
    ) -> Result<Self, ConversionError> {
        let mapping = FormatCatalog::lookup_by_native_type(&source.mime_type)
            .ok_or_else(|| ConversionError::unsupported(&source))?;
        Self::with_mapping(ctx, source, mapping).await
    }

    /// Like [`ConversionEngine::new`] but returns `Ok(None)` for files we
    /// don't convert.
    #[allow(dead_code)]
    pub async fn build_if_supported(
        ctx: ConversionContext<'a, D, E, K>,
        source: DriveFile,
    ) -> Result<Option<Self>, ConversionError> {
        match FormatCatalog::lookup_by_native_type(&source.mime_type) {
            Some(mapping) => Ok(Some(Self::with_mapping(ctx, source, mapping).await?)),
            None => Ok(None),
        }
    }

    /// Builds an engine for an explicit mapping; the source must carry the
    /// mapping's Google mime type.
    pub async fn with_mapping(
        ctx: ConversionContext<'a, D, E, K>,
        source: DriveFile,
        mapping: &'static FormatMapping,
    ) -> Result<Self, ConversionError> {
        if source.mime_type != mapping.native_mime_type {
            return Err(ConversionError::UnexpectedMimeType {
                id: source.id.clone(),
                name: source.name.clone(),
                mime_type: source.mime_type.clone(),
                expected: mapping.native_mime_type,
            });
        }

        let target_file_name = mapping.target_file_name(&source.name);
        let eligible_folders = resolve_eligible_folders(&ctx, &source).await?;

        Ok(Self {
            ctx,
            source,
            mapping,
            target_file_name,
            eligible_folders,
        })
    }

    #[allow(dead_code)]
    pub fn source(&self) -> &DriveFile {
        &self.source
    }

    #[allow(dead_code)]
    pub fn target_file_name(&self) -> &str {
        &self.target_file_name
    }

    #[allow(dead_code)]
    pub fn target_mime_type(&self) -> &'static str {
        self.mapping.foreign_mime_type
    }

    #[allow(dead_code)]
    pub fn eligible_folders(&self) -> &[DriveFolder] {
        &self.eligible_folders
    }

    /// Converts the source into every eligible folder that lacks a fresh copy
    /// and returns the files created, in folder order.
    pub async fn convert(&self) -> Vec<DriveFile> {
        let mut created = Vec::new();

        for folder in &self.eligible_folders {
            match self.convert_in_folder(folder).await {
                Ok(Some(file)) => created.push(file),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        file_id = %self.source.id,
                        folder_id = %folder.id,
                        "Error converting file {} in {}: {}",
                        self.source.name,
                        folder.name,
                        e
                    );
                }
            }
        }

        created
    }

    /// Office -> Google is not supported. Never touches the provider.
    #[allow(dead_code)]
    pub async fn convert_to_google(&self) -> Result<Vec<DriveFile>, ConversionError> {
        Err(ConversionError::NotImplemented(REVERSE_CONVERSION))
    }

    async fn convert_in_folder(
        &self,
        folder: &DriveFolder,
    ) -> Result<Option<DriveFile>, ConversionError> {
        let candidates = self
            .ctx
            .drive
            .list_files_by_name(folder, &self.target_file_name)
            .await?;

        if let Some(existing) = candidates
            .iter()
            .find(|c| is_fresh_copy(c.modified_time, self.source.modified_time))
        {
            tracing::debug!(
                "Found {} with a timestamp {} newer than {}",
                existing.name,
                existing.modified_time,
                self.source.modified_time
            );
            tracing::info!(
                "Skipping conversion of {} in {} - newer file already exists",
                self.source.name,
                folder.name
            );
            return Ok(None);
        }

        tracing::info!(
            "Starting conversion of {} in {}",
            self.target_file_name,
            folder.name
        );

        let token = self.ctx.tokens.bearer_token().await?;
        let response = self
            .ctx
            .exporter
            .export_file(&self.source.id, self.mapping.foreign_mime_type, &token)
            .await?;

        if !response.is_blob() {
            return Err(ConversionError::ExportRejected {
                status: response.status,
            });
        }

        let content = FileContent {
            mime_type: response
                .content_type
                .unwrap_or_else(|| self.mapping.foreign_mime_type.to_string()),
            bytes: response.body,
        };
        let created = self.ctx.drive.create_file(folder, content).await?;

        let renamed = match self
            .ctx
            .drive
            .rename_file(&created, &self.target_file_name)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    orphan_id = %created.id,
                    "Created {} in {} but could not rename it",
                    created.name,
                    folder.name
                );
                return Err(e.into());
            }
        };

        tracing::info!(
            "Created file {} in {}",
            self.target_file_name,
            folder.name
        );
        Ok(Some(renamed))
    }
}

/// Containing folders the user may write into under `ctx.policy`, in
/// provider order. Permission is queried fresh for every folder.
async fn resolve_eligible_folders<D, E, K>(
    ctx: &ConversionContext<'_, D, E, K>,
    source: &DriveFile,
) -> Result<Vec<DriveFolder>, ConversionError>
where
    D: DriveStore,
{
    let parents = ctx.drive.list_parents(source).await?;
    let mut eligible = Vec::with_capacity(parents.len());

    for folder in parents {
        let level = ctx.drive.get_permission(ctx.user, &folder.id).await?;
        if ctx.policy.admits(level) {
            eligible.push(folder);
        } else {
            tracing::debug!(
                folder_id = %folder.id,
                ?level,
                "Not writing {} into {}",
                source.name,
                folder.name
            );
        }
    }

    Ok(eligible)
}

/// Routes a file to the conversion its mime type calls for.
///
/// Google formats are converted to Office into every eligible folder. Office
/// formats resolve to the reverse direction, which is unimplemented and fails
/// without side effects.
pub async fn convert_file<D, E, K>(
    ctx: ConversionContext<'_, D, E, K>,
    file: DriveFile,
) -> Result<Vec<DriveFile>, ConversionError>
where
    D: DriveStore,
    E: ExportTransport,
    K: TokenSource,
{
    match FormatCatalog::direction_for(&file.mime_type) {
        Some(ConversionDirection::NativeToForeign(mapping)) => {
            let engine = ConversionEngine::with_mapping(ctx, file, mapping).await?;
            Ok(engine.convert().await)
        }
        Some(ConversionDirection::ForeignToNative(_)) => {
            Err(ConversionError::NotImplemented(REVERSE_CONVERSION))
        }
        None => Err(ConversionError::unsupported(&file)),
    }
}
