/// The uploaded bytes are not something we can treat as an image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("The selected file is empty")]
    Empty,
    #[error("The selected file is not a supported image (detected {0})")]
    NotAnImage(String),
    #[error("The selected file could not be recognized as an image")]
    Unrecognized,
    #[error("Malformed image data URI: {0}")]
    MalformedDataUri(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Hairstyle '{0}' is not in the catalog")]
pub struct StyleNotFound(pub String);
