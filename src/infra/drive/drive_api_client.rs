use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::core::conversion::{
    DriveError, DriveFile, DriveFolder, DriveStore, FileContent, PermissionLevel, TokenSource,
};

const FILE_FIELDS: &str = "id,name,mimeType,modifiedTime,parents";
const PAGE_SIZE: &str = "1000";

/// Google Drive v3 REST client. It exposes only the calls the conversion core
/// needs, and drains every paged listing before returning.
pub struct DriveApiClient {
    client: Client,
    base_url: String,
    upload_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl DriveApiClient {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenSource>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            upload_url: upload_base(&base_url),
            base_url,
            tokens,
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, DriveError> {
        let token = self.tokens.bearer_token().await?;
        Ok(request.bearer_auth(token))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, DriveError> {
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DriveError::Api(format!("{} failed ({}): {}", what, status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| DriveError::Decode(format!("{}: {}", what, e)))
    }

    /// Runs a `files.list` query and follows `nextPageToken` to the end.
    async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>, DriveError> {
        let url = format!("{}/files", self.base_url);
        let fields = format!("nextPageToken,files({})", FILE_FIELDS);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.to_string()),
                ("fields", fields.clone()),
                ("pageSize", PAGE_SIZE.to_string()),
                ("supportsAllDrives", "true".to_string()),
                ("includeItemsFromAllDrives", "true".to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: ApiFileList = self
                .send_json(self.client.get(&url).query(&params), "files.list")
                .await?;

            for file in page.files {
                files.push(file.into_drive_file()?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }

    async fn get_folder(&self, folder_id: &str) -> Result<DriveFolder, DriveError> {
        let url = format!("{}/files/{}", self.base_url, folder_id);
        let folder: ApiFolder = self
            .send_json(
                self.client
                    .get(url)
                    .query(&[("fields", "id,name"), ("supportsAllDrives", "true")]),
                "files.get",
            )
            .await?;
        Ok(DriveFolder {
            id: folder.id,
            name: folder.name,
        })
    }
}

#[async_trait]
impl DriveStore for DriveApiClient {
    async fn list_files_by_mime_type(&self, mime_type: &str) -> Result<Vec<DriveFile>, DriveError> {
        self.list_files(&mime_type_query(mime_type)).await
    }

    async fn list_parents(&self, file: &DriveFile) -> Result<Vec<DriveFolder>, DriveError> {
        let mut folders = Vec::with_capacity(file.parent_ids.len());
        for parent_id in &file.parent_ids {
            folders.push(self.get_folder(parent_id).await?);
        }
        Ok(folders)
    }

    async fn list_files_by_name(
        &self,
        folder: &DriveFolder,
        name: &str,
    ) -> Result<Vec<DriveFile>, DriveError> {
        self.list_files(&name_in_folder_query(name, &folder.id)).await
    }

    async fn get_permission(
        &self,
        principal: &str,
        item_id: &str,
    ) -> Result<PermissionLevel, DriveError> {
        let url = format!("{}/files/{}/permissions", self.base_url, item_id);
        let mut best = PermissionLevel::None;
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                (
                    "fields",
                    "nextPageToken,permissions(type,role,emailAddress)".to_string(),
                ),
                ("supportsAllDrives", "true".to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let request = self
                .authorized(self.client.get(&url).query(&params))
                .await?;
            let response = request
                .send()
                .await
                .map_err(|e| DriveError::Transport(e.to_string()))?;

            // Viewers and commenters may not read the permission list at all.
            if matches!(response.status(), StatusCode::FORBIDDEN | StatusCode::NOT_FOUND) {
                tracing::debug!(item_id, status = %response.status(), "Permission list not readable");
                return Ok(PermissionLevel::None);
            }
            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(DriveError::Api(format!(
                    "permissions.list failed ({}): {}",
                    status, text
                )));
            }

            let page: ApiPermissionList = response
                .json()
                .await
                .map_err(|e| DriveError::Decode(e.to_string()))?;

            best = best.max(level_for_principal(&page.permissions, principal));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(best)
    }

    async fn create_file(
        &self,
        folder: &DriveFolder,
        content: FileContent,
    ) -> Result<DriveFile, DriveError> {
        let url = format!("{}/files", self.upload_url);
        let boundary = format!("drive-office-converter-{:016x}", rand::random::<u64>());
        let metadata = json!({
            "parents": [folder.id],
            "mimeType": content.mime_type,
        });
        let body = multipart_related_body(&boundary, &metadata, &content);

        let file: ApiFile = self
            .send_json(
                self.client
                    .post(url)
                    .query(&[
                        ("uploadType", "multipart"),
                        ("supportsAllDrives", "true"),
                        ("fields", FILE_FIELDS),
                    ])
                    .header(
                        CONTENT_TYPE,
                        format!("multipart/related; boundary={}", boundary),
                    )
                    .body(body),
                "files.create",
            )
            .await?;
        file.into_drive_file()
    }

    async fn rename_file(&self, file: &DriveFile, name: &str) -> Result<DriveFile, DriveError> {
        let url = format!("{}/files/{}", self.base_url, file.id);
        let renamed: ApiFile = self
            .send_json(
                self.client
                    .patch(url)
                    .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
                    .json(&json!({ "name": name })),
                "files.update",
            )
            .await?;
        renamed.into_drive_file()
    }

    async fn current_user(&self) -> Result<String, DriveError> {
        let url = format!("{}/about", self.base_url);
        let about: ApiAbout = self
            .send_json(
                self.client.get(url).query(&[("fields", "user(emailAddress)")]),
                "about.get",
            )
            .await?;
        Ok(about.user.email_address)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// `https://host/drive/v3` -> `https://host/upload/drive/v3`.
fn upload_base(base_url: &str) -> String {
    match base_url.strip_suffix("/drive/v3") {
        Some(host) => format!("{}/upload/drive/v3", host),
        None => format!("{}/upload", base_url),
    }
}

/// Escapes a value for use inside a single-quoted Drive query string.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn mime_type_query(mime_type: &str) -> String {
    format!(
        "mimeType = '{}' and trashed = false",
        escape_query_value(mime_type)
    )
}

fn name_in_folder_query(name: &str, folder_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and trashed = false",
        escape_query_value(name),
        escape_query_value(folder_id)
    )
}

fn role_to_level(role: &str) -> PermissionLevel {
    match role {
        "owner" => PermissionLevel::Owner,
        "writer" => PermissionLevel::Edit,
        "organizer" | "fileOrganizer" => PermissionLevel::Organizer,
        "commenter" => PermissionLevel::Comment,
        "reader" => PermissionLevel::View,
        _ => PermissionLevel::None,
    }
}

/// Highest level granted directly to `principal`. Group and domain grants are
/// not expanded.
fn level_for_principal(permissions: &[ApiPermission], principal: &str) -> PermissionLevel {
    permissions
        .iter()
        .filter(|p| {
            p.email_address
                .as_deref()
                .is_some_and(|email| email.eq_ignore_ascii_case(principal))
        })
        .map(|p| role_to_level(&p.role))
        .max()
        .unwrap_or(PermissionLevel::None)
}

fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    content: &FileContent,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
            b = boundary,
            meta = metadata,
            mime = content.mime_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(&content.bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

// =============================================================================
// DRIVE API RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    modified_time: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
}

impl ApiFile {
    fn into_drive_file(self) -> Result<DriveFile, DriveError> {
        let modified = self.modified_time.as_deref().ok_or_else(|| {
            DriveError::Decode(format!("file {} has no modifiedTime", self.id))
        })?;
        let modified_time = DateTime::parse_from_rfc3339(modified)
            .map_err(|e| DriveError::Decode(format!("bad modifiedTime {:?}: {}", modified, e)))?
            .with_timezone(&Utc);

        Ok(DriveFile {
            id: self.id,
            name: self.name,
            mime_type: self.mime_type,
            modified_time,
            parent_ids: self.parents,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFileList {
    #[serde(default)]
    files: Vec<ApiFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiFolder {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPermission {
    #[serde(default)]
    role: String,
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPermissionList {
    #[serde(default)]
    permissions: Vec<ApiPermission>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUser {
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct ApiAbout {
    user: ApiUser,
}
