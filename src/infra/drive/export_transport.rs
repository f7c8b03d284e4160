use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};

use crate::core::conversion::{DriveError, ExportResponse, ExportTransport};

/// Calls `files/{id}/export` on the Drive API.
///
/// Non-2xx responses are handed back as-is so the engine can decide what to
/// do with them; only connection-level failures become errors.
pub struct HttpExportTransport {
    client: Client,
    base_url: String,
}

impl HttpExportTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn export_url(&self, file_id: &str) -> String {
        format!("{}/files/{}/export", self.base_url, file_id)
    }

    /// The GET sent by `export_file`, kept separate so it can be inspected
    /// without a network round trip.
    fn export_request(
        &self,
        file_id: &str,
        target_mime_type: &str,
        bearer_token: &str,
    ) -> RequestBuilder {
        self.client
            .get(self.export_url(file_id))
            .query(&[("mimeType", target_mime_type)])
            .bearer_auth(bearer_token)
    }
}

#[async_trait]
impl ExportTransport for HttpExportTransport {
    async fn export_file(
        &self,
        file_id: &str,
        target_mime_type: &str,
        bearer_token: &str,
    ) -> Result<ExportResponse, DriveError> {
        tracing::debug!(file_id, target_mime_type, "Exporting file");

        let response = self
            .export_request(file_id, target_mime_type, bearer_token)
            .send()
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(
                file_id,
                status = status.as_u16(),
                "Export returned {}",
                String::from_utf8_lossy(&body)
            );
        }

        Ok(ExportResponse {
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }
}
