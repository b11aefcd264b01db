use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde_json::json;
use tokio::sync::OnceCell;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod convert;
mod credentials;
mod drive;
mod error;
mod models;
mod page;

use auth::TokenProvider;
use config::Config;
use credentials::ServiceAccountKey;
use drive::DriveClient;
use error::UploadError;
use models::UploadResponse;

const USER_AGENT: &str = "drive-photo-uploader/0.1";
// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

struct AppState {
    config: Config,
    http: reqwest::Client,
    drive: OnceCell<DriveClient>,
}

impl AppState {
    fn new(config: Config, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            drive: OnceCell::new(),
        }
    }

    /// The Drive client is built on first use and kept once it succeeds;
    /// failed attempts are retried on the next upload.
    async fn drive(&self) -> Result<&DriveClient, UploadError> {
        let source = self
            .config
            .credential_source()
            .ok_or(UploadError::NotConfigured)?;

        self.drive
            .get_or_try_init(|| async {
                let key = ServiceAccountKey::load(&source).await?;
                let tokens = TokenProvider::new(self.http.clone(), key)?;
                tracing::info!(
                    client_email = tokens.client_email(),
                    folder_id = %self.config.folder_id,
                    "Drive client ready"
                );
                let client = DriveClient::new(
                    self.http.clone(),
                    &self.config.drive_upload_url,
                    self.config.folder_id.clone(),
                    Arc::new(tokens),
                )?;
                Ok::<_, UploadError>(client)
            })
            .await
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::parse();
    if config.credential_source().is_none() {
        tracing::warn!("neither SERVICE_ACCOUNT_JSON nor SERVICE_ACCOUNT_FILE is set; uploads will fail");
    }

    let http = build_http_client().expect("failed to build HTTP client");
    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState::new(config, http));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .connect_timeout(std::time::Duration::from_secs(5))
        .timeout(std::time::Duration::from_secs(60))
        .user_agent(USER_AGENT)
        .build()
}

fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .route("/", get(page::index))
        .route("/health", get(health))
        .route("/upload", post(upload_endpoint))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn upload_endpoint(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    match upload_photo(&state, multipart).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response_with_detail(state.config.show_error_details),
    }
}

async fn upload_photo(
    state: &AppState,
    multipart: Multipart,
) -> Result<UploadResponse, UploadError> {
    let (file_name, bytes) = read_file_field(multipart, state.config.max_upload_bytes).await?;
    tracing::info!(file_name = %file_name, bytes = bytes.len(), "received photo");

    let drive = state.drive().await?;

    let quality = state.config.jpeg_quality;
    let jpeg = tokio::task::spawn_blocking(move || convert::to_jpeg(&bytes, quality)).await??;

    let file = drive
        .create_file(&file_name, convert::JPEG_MIME, jpeg)
        .await?;

    Ok(UploadResponse {
        link: file.web_view_link,
        file_name,
    })
}

/// Pull the `file` part out of the form, enforcing the size limit while the
/// chunks stream in.
async fn read_file_field(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<(String, Vec<u8>), UploadError> {
    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::TooLarge { limit: max_bytes }
        } else {
            UploadError::MalformedForm(e.body_text())
        }
    };

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = convert::sanitize_file_name(field.file_name().unwrap_or(""));
        if !convert::is_supported_file_name(&file_name) {
            return Err(UploadError::UnsupportedType(file_name));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(UploadError::TooLarge { limit: max_bytes });
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }
        return Ok((file_name, bytes));
    }

    Err(UploadError::MissingFile)
}
