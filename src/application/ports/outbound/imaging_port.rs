//! Imaging port - Local raster work: placeholder artwork and re-encoding

use crate::domain::entities::ImageMime;
use crate::domain::value_objects::PlaceholderScheme;

/// Everything needed to paint a placeholder illustration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderScene {
    pub scheme: &'static PlaceholderScheme,
    pub protagonist: String,
    /// "Cover" or "Section k of N"
    pub label: String,
    /// Text inside the circular badge
    pub badge_text: String,
}

/// Re-encoded image ready for embedding
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub mime: ImageMime,
}

#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("failed to render scene: {0}")]
    Render(String),
}

pub trait ImageProcessingPort: Send + Sync {
    /// Rasterize a placeholder scene to PNG bytes
    fn render_placeholder(&self, scene: &PlaceholderScene) -> Result<Vec<u8>, ImagingError>;

    /// Downscale to the configured bound and re-encode to a compressed lossy format
    fn normalize(&self, bytes: &[u8]) -> Result<NormalizedImage, ImagingError>;
}
