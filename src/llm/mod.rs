pub mod error;
pub mod gemini;
pub mod prompt;

use async_trait::async_trait;

use crate::imaging::UploadedImage;

pub use error::{ErrorKind, GenerationError};
pub use gemini::{GeminiClient, HttpTransport, Transport};

/// Renders `source` with the requested hairstyle. One call is one remote
/// exchange; implementations never retry on their own.
#[async_trait]
pub trait HairstyleGenerator: Send + Sync {
    async fn generate(
        &self,
        source: &UploadedImage,
        style_name: &str,
        style_description: &str,
    ) -> Result<UploadedImage, GenerationError>;
}
