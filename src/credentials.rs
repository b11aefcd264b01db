use std::fmt;

use serde::Deserialize;

use crate::config::CredentialSource;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to read service account key from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("service account key is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("expected a service_account key, got {0:?}")]
    WrongType(String),
    #[error("service account key is missing {0}")]
    MissingField(&'static str),
}

// ── Key ──────────────────────────────────────────────────────────────────────

/// The fields of a Google service-account JSON key that the uploader needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: Option<String>,
    pub project_id: Option<String>,
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, CredentialError> {
        let key: ServiceAccountKey = serde_json::from_str(json)?;
        key.validate()?;
        Ok(key)
    }

    pub async fn load(source: &CredentialSource) -> Result<Self, CredentialError> {
        match source {
            CredentialSource::Inline(json) => Self::from_json(json),
            CredentialSource::File(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| CredentialError::Read {
                        path: path.display().to_string(),
                        source,
                    })?;
                Self::from_json(&json)
            }
        }
    }

    fn validate(&self) -> Result<(), CredentialError> {
        if let Some(kind) = self.key_type.as_deref() {
            if kind != "service_account" {
                return Err(CredentialError::WrongType(kind.to_string()));
            }
        }
        if self.client_email.trim().is_empty() {
            return Err(CredentialError::MissingField("client_email"));
        }
        if self.private_key.trim().is_empty() {
            return Err(CredentialError::MissingField("private_key"));
        }
        if self.token_uri.trim().is_empty() {
            return Err(CredentialError::MissingField("token_uri"));
        }
        Ok(())
    }
}
