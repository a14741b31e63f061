//! Raster work behind the imaging port

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use resvg::{tiny_skia, usvg};
use tracing::debug;

use super::placeholder::{placeholder_svg, PLACEHOLDER_SIZE};
use crate::application::ports::outbound::{
    ImageProcessingPort, ImagingError, NormalizedImage, PlaceholderScene,
};
use crate::domain::entities::ImageMime;

/// Rasterizes placeholders and re-encodes generated images
pub struct ImageProcessor {
    max_dimension: u32,
    jpeg_quality: u8,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl ImageProcessor {
    /// Create a processor; system fonts are loaded once for placeholder text
    pub fn new(max_dimension: u32, jpeg_quality: u8) -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        debug!(faces = fontdb.len(), "Loaded fonts for placeholder artwork");

        Self {
            max_dimension: max_dimension.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
            fontdb: Arc::new(fontdb),
        }
    }

    fn rasterize(&self, svg: &str) -> Result<Vec<u8>, ImagingError> {
        let options = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..usvg::Options::default()
        };
        let tree =
            usvg::Tree::from_str(svg, &options).map_err(|e| ImagingError::Render(e.to_string()))?;

        let mut pixmap = tiny_skia::Pixmap::new(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)
            .ok_or_else(|| ImagingError::Render("could not allocate pixmap".to_string()))?;
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        pixmap
            .encode_png()
            .map_err(|e| ImagingError::Encode(e.to_string()))
    }
}

impl ImageProcessingPort for ImageProcessor {
    fn render_placeholder(&self, scene: &PlaceholderScene) -> Result<Vec<u8>, ImagingError> {
        self.rasterize(&placeholder_svg(scene))
    }

    fn normalize(&self, bytes: &[u8]) -> Result<NormalizedImage, ImagingError> {
        let image =
            image::load_from_memory(bytes).map_err(|e| ImagingError::Decode(e.to_string()))?;

        let image = if image.width() > self.max_dimension || image.height() > self.max_dimension {
            image.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
        } else {
            image
        };

        let rgb = image.to_rgb8();
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, self.jpeg_quality)
            .encode_image(&rgb)
            .map_err(|e| ImagingError::Encode(e.to_string()))?;

        Ok(NormalizedImage {
            bytes: encoded,
            mime: ImageMime::Jpeg,
        })
    }
}
