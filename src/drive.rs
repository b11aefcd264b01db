use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::auth::{AuthError, TokenProvider};

const RETURNED_FIELDS: &str = "id,webViewLink";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("invalid Drive upload URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Drive request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Drive returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Drive response did not include a webViewLink")]
    MissingLink,
}

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveFile {
    pub id: Option<String>,
    pub web_view_link: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedFile {
    id: Option<String>,
    web_view_link: Option<String>,
}

/// Uploads files into one fixed Drive folder.
pub struct DriveClient {
    http: reqwest::Client,
    upload_url: Url,
    folder_id: String,
    tokens: Arc<TokenProvider>,
}

impl DriveClient {
    pub fn new(
        http: reqwest::Client,
        upload_url: &str,
        folder_id: impl Into<String>,
        tokens: Arc<TokenProvider>,
    ) -> Result<Self, DriveError> {
        Ok(Self {
            http,
            upload_url: Url::parse(upload_url)?,
            folder_id: folder_id.into(),
            tokens,
        })
    }

    /// Create `name` in the folder with a single multipart request and return
    /// its browser link.
    pub async fn create_file(
        &self,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<DriveFile, DriveError> {
        let token = self.tokens.access_token().await?;

        let mut url = self.upload_url.clone();
        url.query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", RETURNED_FIELDS)
            .append_pair("supportsAllDrives", "true");

        let metadata = json!({ "name": name, "parents": [self.folder_id] });
        let boundary = multipart_boundary();
        let size = bytes.len();
        let body = related_body(&boundary, &metadata, mime_type, &bytes);

        tracing::info!(file_name = name, folder_id = %self.folder_id, bytes = size, "uploading to Drive");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedFile = response.json().await?;
        let web_view_link = created
            .web_view_link
            .filter(|link| !link.is_empty())
            .ok_or(DriveError::MissingLink)?;

        tracing::info!(file_id = ?created.id, "Drive file created");
        Ok(DriveFile {
            id: created.id,
            web_view_link,
        })
    }
}

// ── multipart/related encoding ───────────────────────────────────────────────

fn multipart_boundary() -> String {
    format!(
        "photo_upload_{:x}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

fn related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    mime_type: &str,
    media: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + 256);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
            b = boundary,
            meta = metadata,
            mime = mime_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
