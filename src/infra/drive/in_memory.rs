// In-memory implementations of the drive ports, used by the core's tests.
//
// The drive keeps files in insertion order so listings are deterministic,
// counts every call by operation name, and can be told to fail specific
// operations in specific folders.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::core::conversion::{
    DriveError, DriveFile, DriveFolder, DriveStore, ExportResponse, ExportTransport, FileContent,
    PermissionLevel, TokenSource,
};

/// Operations that can be made to fail for a given folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ListByName,
    Create,
    Rename,
}

pub struct InMemoryDrive {
    user: String,
    files: Mutex<Vec<DriveFile>>,
    folders: DashMap<String, DriveFolder>,
    /// (principal, item id) -> level. Missing entries resolve to `None`.
    permissions: DashMap<(String, String), PermissionLevel>,
    failures: DashMap<(String, FailPoint), String>,
    calls: DashMap<&'static str, usize>,
    next_id: AtomicU64,
    /// Timestamp stamped on files created through the port.
    created_at: Mutex<DateTime<Utc>>,
}

impl InMemoryDrive {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            files: Mutex::new(Vec::new()),
            folders: DashMap::new(),
            permissions: DashMap::new(),
            failures: DashMap::new(),
            calls: DashMap::new(),
            next_id: AtomicU64::new(1),
            created_at: Mutex::new(Utc::now()),
        }
    }

    /// Adds a folder and grants the drive's user `level` on it.
    pub fn add_folder(&self, id: &str, name: &str, level: PermissionLevel) -> DriveFolder {
        let folder = DriveFolder {
            id: id.to_string(),
            name: name.to_string(),
        };
        self.folders.insert(id.to_string(), folder.clone());
        self.set_permission(&self.user.clone(), id, level);
        folder
    }

    pub fn add_file(&self, file: DriveFile) {
        self.files.lock().unwrap().push(file);
    }

    pub fn set_permission(&self, principal: &str, item_id: &str, level: PermissionLevel) {
        self.permissions
            .insert((principal.to_string(), item_id.to_string()), level);
    }

    pub fn fail(&self, folder_id: &str, point: FailPoint, message: &str) {
        self.failures
            .insert((folder_id.to_string(), point), message.to_string());
    }

    pub fn set_created_at(&self, at: DateTime<Utc>) {
        *self.created_at.lock().unwrap() = at;
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.get(op).map(|count| *count).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }

    pub fn files_in(&self, folder_id: &str) -> Vec<DriveFile> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.parent_ids.iter().any(|p| p == folder_id))
            .cloned()
            .collect()
    }

    fn record(&self, op: &'static str) {
        *self.calls.entry(op).or_insert(0) += 1;
    }

    fn check(&self, folder_id: &str, point: FailPoint) -> Result<(), DriveError> {
        match self.failures.get(&(folder_id.to_string(), point)) {
            Some(message) => Err(DriveError::Api(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DriveStore for InMemoryDrive {
    async fn list_files_by_mime_type(&self, mime_type: &str) -> Result<Vec<DriveFile>, DriveError> {
        self.record("list_files_by_mime_type");
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.mime_type == mime_type)
            .cloned()
            .collect())
    }

    async fn list_parents(&self, file: &DriveFile) -> Result<Vec<DriveFolder>, DriveError> {
        self.record("list_parents");
        file.parent_ids
            .iter()
            .map(|id| {
                self.folders
                    .get(id)
                    .map(|folder| folder.clone())
                    .ok_or_else(|| DriveError::Api(format!("folder {} not found", id)))
            })
            .collect()
    }

    async fn list_files_by_name(
        &self,
        folder: &DriveFolder,
        name: &str,
    ) -> Result<Vec<DriveFile>, DriveError> {
        self.record("list_files_by_name");
        self.check(&folder.id, FailPoint::ListByName)?;
        Ok(self
            .files_in(&folder.id)
            .into_iter()
            .filter(|f| f.name == name)
            .collect())
    }

    async fn get_permission(
        &self,
        principal: &str,
        item_id: &str,
    ) -> Result<PermissionLevel, DriveError> {
        self.record("get_permission");
        Ok(self
            .permissions
            .get(&(principal.to_string(), item_id.to_string()))
            .map(|level| *level)
            .unwrap_or(PermissionLevel::None))
    }

    async fn create_file(
        &self,
        folder: &DriveFolder,
        content: FileContent,
    ) -> Result<DriveFile, DriveError> {
        self.record("create_file");
        self.check(&folder.id, FailPoint::Create)?;
        let file = DriveFile {
            id: format!("created-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            name: "Untitled".to_string(),
            mime_type: content.mime_type,
            modified_time: *self.created_at.lock().unwrap(),
            parent_ids: vec![folder.id.clone()],
        };
        self.add_file(file.clone());
        Ok(file)
    }

    async fn rename_file(&self, file: &DriveFile, name: &str) -> Result<DriveFile, DriveError> {
        self.record("rename_file");
        for parent in &file.parent_ids {
            self.check(parent, FailPoint::Rename)?;
        }
        let mut files = self.files.lock().unwrap();
        let stored = files
            .iter_mut()
            .find(|f| f.id == file.id)
            .ok_or_else(|| DriveError::Api(format!("file {} not found", file.id)))?;
        stored.name = name.to_string();
        Ok(stored.clone())
    }

    async fn current_user(&self) -> Result<String, DriveError> {
        self.record("current_user");
        Ok(self.user.clone())
    }
}

/// Records every export request and answers with a canned response.
pub struct RecordingExporter {
    requests: Mutex<Vec<ExportRequest>>,
    status: u16,
    /// Exports of these file ids fail at the transport level.
    failing_ids: DashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub file_id: String,
    pub target_mime_type: String,
    pub bearer_token: String,
}

impl ExportRequest {
    /// The URL the HTTP transport would hit for this request.
    pub fn url(&self) -> String {
        format!(
            "https://www.googleapis.com/drive/v3/files/{}/export?mimeType={}",
            self.file_id, self.target_mime_type
        )
    }
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status,
            failing_ids: DashMap::new(),
        }
    }

    pub fn fail_for(&self, file_id: &str, message: &str) {
        self.failing_ids
            .insert(file_id.to_string(), message.to_string());
    }

    pub fn requests(&self) -> Vec<ExportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExportTransport for RecordingExporter {
    async fn export_file(
        &self,
        file_id: &str,
        target_mime_type: &str,
        bearer_token: &str,
    ) -> Result<ExportResponse, DriveError> {
        self.requests.lock().unwrap().push(ExportRequest {
            file_id: file_id.to_string(),
            target_mime_type: target_mime_type.to_string(),
            bearer_token: bearer_token.to_string(),
        });
        if let Some(message) = self.failing_ids.get(file_id) {
            return Err(DriveError::Transport(message.clone()));
        }
        let body = if (200..300).contains(&self.status) {
            format!("exported {} as {}", file_id, target_mime_type).into_bytes()
        } else {
            br#"{"error":{"code":403,"message":"forbidden"}}"#.to_vec()
        };
        Ok(ExportResponse {
            status: self.status,
            content_type: Some(target_mime_type.to_string()),
            body,
        })
    }
}

/// Always hands out the same token and counts how often it was asked.
pub struct FixedToken {
    token: String,
    issued: AtomicU64,
}

impl FixedToken {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            issued: AtomicU64::new(0),
        }
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for FixedToken {
    async fn bearer_token(&self) -> Result<String, DriveError> {
        self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }
}
