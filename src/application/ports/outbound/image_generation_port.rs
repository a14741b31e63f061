//! Image generation port
//!
//! Each implementation is one channel to a remote image generator. The
//! illustration service tries them in order until one yields bytes.

use async_trait::async_trait;

use super::GenerationError;

#[async_trait]
pub trait ImageGenerationPort: Send + Sync {
    /// Short name used in logs
    fn provider_name(&self) -> &str;

    /// Synthesize an image for the prompt and return its encoded bytes.
    ///
    /// A zero-length result must be reported as [`GenerationError::EmptyBody`].
    async fn synthesize_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError>;
}
