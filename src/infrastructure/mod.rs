//! Infrastructure layer - External adapters and implementations
//!
//! This layer contains:
//! - OpenAI: caption and image generation over an OpenAI-compatible API
//! - ComfyUI: self-hosted image generation, tried after OpenAI
//! - Imaging: placeholder artwork and image re-encoding
//! - Document: PDF layout and serialization
//! - Storage: object storage and local scratch backends
//! - HTTP: REST API routes
//! - Config: Application configuration
//! - State: Shared application state

pub mod comfyui;
pub mod config;
pub mod document;
pub mod http;
pub mod imaging;
pub mod openai;
pub mod state;
pub mod storage;

#[cfg(test)]
pub mod test_support;
