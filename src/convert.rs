use image::codecs::jpeg::JpegEncoder;
use once_cell::sync::Lazy;
use regex::Regex;

pub const JPEG_MIME: &str = "image/jpeg";
pub const DEFAULT_FILE_NAME: &str = "photo.jpg";
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

// Control characters are stripped from names before they reach Drive.
static UNSAFE_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x00-\x1f\x7f]").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("image is empty")]
    Empty,
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("could not encode JPEG: {0}")]
    Encode(#[source] image::ImageError),
}

/// True when the name ends in one of the extensions the picker offers.
pub fn is_supported_file_name(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Keep only the last path component and strip control characters.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned = UNSAFE_NAME_RE.replace_all(base, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        DEFAULT_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Decode any supported image and re-encode it as JPEG.
///
/// Alpha is dropped since JPEG cannot carry it.
pub fn to_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, ConvertError> {
    if bytes.is_empty() {
        return Err(ConvertError::Empty);
    }
    let image = image::load_from_memory(bytes).map_err(ConvertError::Decode)?;
    let rgb = image.to_rgb8();

    let mut out = Vec::with_capacity(bytes.len());
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(ConvertError::Encode)?;

    tracing::debug!(
        width = rgb.width(),
        height = rgb.height(),
        input_bytes = bytes.len(),
        jpeg_bytes = out.len(),
        "encoded JPEG"
    );
    Ok(out)
}
