//! Domain entities - Objects that make up one storybook build

mod artifact;
mod document;
mod illustration;
mod section;

pub use artifact::{RetrievalReference, StoredArtifact};
pub use document::{PageInfo, PageKind, RenderedDocument, TocEntry};
pub use illustration::{ImageMime, Illustration, IllustrationOrigin};
pub use section::{Section, COVER_INDEX};
