//! Outbound ports - Interfaces that the application requires from external systems

mod artifact_store_port;
mod document_port;
mod generation_error;
mod image_generation_port;
mod imaging_port;
mod llm_port;

pub use artifact_store_port::{ArtifactStorePort, StorageError};
pub use document_port::{AssemblyError, DocumentInput, DocumentRendererPort};
pub use generation_error::{looks_like_auth_failure, GenerationError};
pub use image_generation_port::ImageGenerationPort;
pub use imaging_port::{ImageProcessingPort, ImagingError, NormalizedImage, PlaceholderScene};
pub use llm_port::{ChatMessage, LlmPort, LlmRequest, LlmResponse, MessageRole};
