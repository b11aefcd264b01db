use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::auth::AuthError;
use crate::convert::ConvertError;
use crate::credentials::CredentialError;
use crate::drive::DriveError;
use crate::models::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no service account credentials configured")]
    NotConfigured,
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("form has no file field")]
    MissingFile,
    #[error("uploaded file is empty")]
    EmptyFile,
    #[error("failed to parse multipart data: {0}")]
    MalformedForm(String),
    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Drive(#[from] DriveError),
    #[error("image conversion task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            UploadError::Credentials(_) | UploadError::Auth(_) => StatusCode::BAD_GATEWAY,
            UploadError::Drive(_) => StatusCode::BAD_GATEWAY,
            UploadError::MissingFile
            | UploadError::EmptyFile
            | UploadError::MalformedForm(_) => StatusCode::BAD_REQUEST,
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
            UploadError::Convert(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UploadError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to end users; never carries technical detail.
    pub fn user_message(&self) -> String {
        match self {
            UploadError::NotConfigured => {
                "Configuration error. Contact the administrator.".to_string()
            }
            UploadError::Credentials(_)
            | UploadError::Auth(_)
            | UploadError::Drive(DriveError::Auth(_)) => {
                "Error connecting to Google Drive".to_string()
            }
            UploadError::Drive(_) => "Error uploading the file".to_string(),
            UploadError::MissingFile => "Select an image to upload".to_string(),
            UploadError::EmptyFile => "The selected file is empty".to_string(),
            UploadError::MalformedForm(_) => "The upload form could not be read".to_string(),
            UploadError::TooLarge { limit } => {
                format!("The image is too large (maximum {})", human_size(*limit))
            }
            UploadError::UnsupportedType(_) => {
                "Only JPG, JPEG and PNG images are accepted".to_string()
            }
            UploadError::Convert(_) => "The file could not be read as an image".to_string(),
            UploadError::Task(_) => "Error uploading the photo".to_string(),
        }
    }

    /// Build the HTTP response, optionally attaching the technical error text.
    pub fn into_response_with_detail(self, show_detail: bool) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "upload failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "upload rejected");
        }
        let body = ErrorResponse {
            error: self.user_message(),
            detail: show_detail.then(|| self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

// Rounded up so a limit never reads as zero.
fn human_size(bytes: usize) -> String {
    if bytes >= MIB {
        format!("{} MB", bytes.div_ceil(MIB))
    } else {
        format!("{} KB", bytes.div_ceil(KIB).max(1))
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        self.into_response_with_detail(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_failures_are_generic() {
        let err = UploadError::Drive(DriveError::Api {
            status: 403,
            body: "insufficientFilePermissions".into(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.user_message(), "Error uploading the file");
        assert!(!err.user_message().contains("insufficient"));
    }

    #[test]
    fn token_failures_during_upload_read_as_connection_errors() {
        let err = UploadError::Drive(DriveError::Auth(AuthError::Rejected {
            status: 400,
            body: "invalid_grant".into(),
        }));
        assert_eq!(err.user_message(), "Error connecting to Google Drive");
    }

    #[test]
    fn missing_credentials_is_unavailable() {
        let err = UploadError::NotConfigured;
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.user_message(), "Configuration error. Contact the administrator.");
    }

    #[test]
    fn too_large_reports_limit_in_megabytes() {
        let err = UploadError::TooLarge { limit: 5 * 1024 * 1024 };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(err.user_message().contains("5 MB"));
    }

    #[test]
    fn small_limits_never_read_as_zero() {
        assert_eq!(
            UploadError::TooLarge { limit: 512 * 1024 }.user_message(),
            "The image is too large (maximum 512 KB)"
        );
        assert_eq!(
            UploadError::TooLarge { limit: 1536 * 1024 }.user_message(),
            "The image is too large (maximum 2 MB)"
        );
        assert_eq!(
            UploadError::TooLarge { limit: 10 }.user_message(),
            "The image is too large (maximum 1 KB)"
        );
    }

    #[test]
    fn bad_forms_get_distinct_messages() {
        let messages = [
            UploadError::MissingFile.user_message(),
            UploadError::EmptyFile.user_message(),
            UploadError::MalformedForm("boundary".into()).user_message(),
        ];
        assert_eq!(messages[1], "The selected file is empty");
        assert_eq!(messages[2], "The upload form could not be read");
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[0], messages[2]);
        for err in [UploadError::MissingFile, UploadError::EmptyFile, UploadError::MalformedForm(String::new())] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }
}
