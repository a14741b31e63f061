//! Illustration entity - Image bytes owned by one section slot

use serde::{Deserialize, Serialize};

/// Where an illustration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IllustrationOrigin {
    Generated,
    Placeholder,
}

/// Image formats the pipeline produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageMime {
    Png,
    Jpeg,
    Webp,
    /// Bytes passed through unchanged that could not be identified
    Unknown,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Unknown => "application/octet-stream",
        }
    }

    /// Identify an image from its leading magic bytes
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Self::Png
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Self::Webp
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for ImageMime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image for one section slot, exclusively owned by a single build
#[derive(Debug, Clone)]
pub struct Illustration {
    pub owner_section_index: usize,
    pub bytes: Vec<u8>,
    pub mime: ImageMime,
    pub origin: IllustrationOrigin,
}

impl Illustration {
    pub fn is_placeholder(&self) -> bool {
        self.origin == IllustrationOrigin::Placeholder
    }
}
