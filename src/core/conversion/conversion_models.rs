// Shared vocabulary for the conversion core: what a drive file and folder look
// like to us, how permission levels compare, and how the batch is configured.
// NO HTTP or Google client types in here.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DRIVE_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

// ============================================================================
// DRIVE ENTITIES
// ============================================================================

/// Read-only view of a file owned by the storage provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub modified_time: DateTime<Utc>,
    /// Ids of the containing folders, in provider order.
    pub parent_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DriveFolder {
    pub id: String,
    pub name: String,
}

/// Content handed to the provider when materialising an exported copy.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Raw result of an export call. Non-2xx responses land here too; the caller
/// decides whether it got a usable blob.
#[derive(Debug, Clone)]
pub struct ExportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ExportResponse {
    pub fn is_blob(&self) -> bool {
        (200..300).contains(&self.status) && !self.body.is_empty()
    }
}

// ============================================================================
// PERMISSIONS
// ============================================================================

/// Access a principal has on a file or folder, ordered by privilege.
///
/// `Edit` and `Owner` both pass the editor check, only `Owner` passes the
/// owner check. `Organizer` sits below `Edit` for our purposes even though
/// shared drives treat it as a superset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionLevel {
    None,
    View,
    Comment,
    Organizer,
    Edit,
    Owner,
}

impl PermissionLevel {
    pub fn is_editor(self) -> bool {
        matches!(self, PermissionLevel::Edit | PermissionLevel::Owner)
    }

    pub fn is_owner(self) -> bool {
        self == PermissionLevel::Owner
    }
}

/// Which containing folders may receive a converted copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderPolicy {
    #[default]
    OwnedOnly,
    EditorOrBetter,
}

impl FolderPolicy {
    pub fn from_owned_folders_only(owned_folders_only: bool) -> Self {
        if owned_folders_only {
            FolderPolicy::OwnedOnly
        } else {
            FolderPolicy::EditorOrBetter
        }
    }

    pub fn admits(self, level: PermissionLevel) -> bool {
        match self {
            FolderPolicy::OwnedOnly => level.is_owner(),
            FolderPolicy::EditorOrBetter => level.is_editor(),
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Batch settings, normally read from the environment in `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    pub owned_folders_only: bool,
    /// `None` runs the batch once and exits.
    pub interval: Option<Duration>,
    pub api_base_url: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            owned_folders_only: true,
            interval: None,
            api_base_url: DEFAULT_DRIVE_API_BASE_URL.to_string(),
        }
    }
}

impl ConverterConfig {
    /// Builds the config from a key lookup so tests don't have to touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("OWNED_FOLDERS_ONLY") {
            config.owned_folders_only =
                parse_bool(&value).ok_or(ConfigError::Invalid {
                    key: "OWNED_FOLDERS_ONLY",
                    value,
                })?;
        }

        if let Some(value) = lookup("CONVERSION_INTERVAL_SECS") {
            let secs = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    key: "CONVERSION_INTERVAL_SECS",
                    value,
                })?;
            config.interval = Some(Duration::from_secs(secs));
        }

        if let Some(url) = lookup("DRIVE_API_BASE_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if !url.is_empty() {
                config.api_base_url = url;
            }
        }

        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn folder_policy(&self) -> FolderPolicy {
        FolderPolicy::from_owned_folders_only(self.owned_folders_only)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
