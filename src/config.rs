use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// Runtime configuration. Every option can also come from the environment
/// (or a `.env` file loaded before parsing).
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Single-page photo uploader backed by Google Drive", long_about = None)]
pub struct Config {
    /// Listening host
    #[arg(long, env = "UPLOADER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listening port
    #[arg(short, long, env = "UPLOADER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Drive folder that receives every upload
    #[arg(long, env = "DRIVE_FOLDER_ID")]
    pub folder_id: String,

    /// Service-account key as an inline JSON blob
    #[arg(long, env = "SERVICE_ACCOUNT_JSON", hide_env_values = true)]
    pub service_account_json: Option<String>,

    /// Path to a service-account key file
    #[arg(long, env = "SERVICE_ACCOUNT_FILE")]
    pub service_account_file: Option<PathBuf>,

    /// Include technical error details in API responses
    #[arg(long, env = "SHOW_ERROR_DETAILS", default_value_t = false)]
    pub show_error_details: bool,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Quality used when re-encoding images as JPEG
    #[arg(
        long,
        env = "JPEG_QUALITY",
        default_value_t = 75,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub jpeg_quality: u8,

    /// Drive media upload endpoint
    #[arg(long, env = "DRIVE_UPLOAD_URL", default_value = DEFAULT_DRIVE_UPLOAD_URL)]
    pub drive_upload_url: String,
}

/// Where the service-account key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Inline(String),
    File(PathBuf),
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Inline JSON takes precedence over a key file.
    pub fn credential_source(&self) -> Option<CredentialSource> {
        if let Some(json) = self
            .service_account_json
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            return Some(CredentialSource::Inline(json.to_string()));
        }
        self.service_account_file
            .clone()
            .map(CredentialSource::File)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["drive-photo-uploader"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&["--folder-id", "folder123"]);
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.jpeg_quality, 75);
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.drive_upload_url, DEFAULT_DRIVE_UPLOAD_URL);
        assert!(!config.show_error_details);
    }

    #[test]
    fn inline_json_wins_over_file() {
        let config = parse(&[
            "--folder-id",
            "f",
            "--service-account-json",
            "{}",
            "--service-account-file",
            "/tmp/key.json",
        ]);
        assert_eq!(
            config.credential_source(),
            Some(CredentialSource::Inline("{}".to_string()))
        );
    }

    #[test]
    fn blank_inline_json_falls_back_to_file() {
        let config = parse(&[
            "--folder-id",
            "f",
            "--service-account-json",
            "  ",
            "--service-account-file",
            "/tmp/key.json",
        ]);
        assert_eq!(
            config.credential_source(),
            Some(CredentialSource::File(PathBuf::from("/tmp/key.json")))
        );
    }

    #[test]
    fn no_credentials_configured() {
        let config = parse(&["--folder-id", "f"]);
        assert_eq!(config.credential_source(), None);
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let result = Config::try_parse_from([
            "drive-photo-uploader",
            "--folder-id",
            "f",
            "--jpeg-quality",
            "0",
        ]);
        assert!(result.is_err());
    }
}
