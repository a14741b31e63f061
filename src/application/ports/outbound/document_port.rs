//! Document port - Lays out and serializes the storybook

use crate::domain::entities::{Illustration, RenderedDocument, Section};

/// Inputs for one document; `illustrations` is indexed by section index,
/// with the cover at 0.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub title: String,
    pub narrative: String,
    pub sections: Vec<Section>,
    pub illustrations: Vec<Illustration>,
}

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("failed to encode page content: {0}")]
    Content(String),
    #[error("failed to write document: {0}")]
    Write(#[from] std::io::Error),
}

pub trait DocumentRendererPort: Send + Sync {
    fn render(&self, input: DocumentInput) -> Result<RenderedDocument, AssemblyError>;
}
