use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DecodeError;
use crate::imaging::mime::{detect_mime_type, normalize_image_mime_type};

static DATA_URI_ENVELOPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^data:(image/[a-z0-9.+-]+);base64,").expect("data URI pattern is valid")
});

/// Removes a `data:image/...;base64,` prefix, leaving the base64 payload.
/// Input without an envelope is returned as-is.
pub fn strip_envelope(data: &str) -> &str {
    let trimmed = data.trim_start();
    match DATA_URI_ENVELOPE.find(trimmed) {
        Some(envelope) => &trimmed[envelope.end()..],
        None => data,
    }
}

fn probe_dimensions(bytes: &[u8]) -> Result<(), DecodeError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| DecodeError::Unrecognized)?;
    if reader.format().is_some_and(|format| format.reading_enabled()) {
        reader
            .into_dimensions()
            .map_err(|_| DecodeError::Unrecognized)?;
    }
    Ok(())
}

/// An encoded image plus its encoding tag. The in-session representation of
/// both the user's upload and the generated result.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedImage {
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl UploadedImage {
    /// Wraps bytes without validating them.
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Validates user-selected bytes. The header must identify an image, and
    /// formats we can decode locally must also yield readable dimensions.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mime_type = match detect_mime_type(&bytes) {
            Some(mime) if mime.starts_with("image/") => normalize_image_mime_type(&mime),
            Some(mime) => return Err(DecodeError::NotAnImage(mime)),
            None => return Err(DecodeError::Unrecognized),
        };

        probe_dimensions(&bytes)?;
        Ok(Self::new(mime_type, bytes))
    }

    pub fn from_data_uri(data_uri: &str) -> Result<Self, DecodeError> {
        let trimmed = data_uri.trim();
        let captures = DATA_URI_ENVELOPE
            .captures(trimmed)
            .ok_or_else(|| DecodeError::MalformedDataUri("missing data:image/...;base64, prefix".to_string()))?;
        let mime_type = normalize_image_mime_type(&captures[1]);
        let payload = strip_envelope(trimmed);
        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|err| DecodeError::MalformedDataUri(err.to_string()))?;
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Self::new(mime_type, bytes))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
