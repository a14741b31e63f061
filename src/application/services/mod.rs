//! Application services - Use case implementations
//!
//! The storybook pipeline is composed from these services: the section
//! splitter cuts the narrative, the illustration service acquires one image
//! per slot, and the storybook service drives assembly and storage through
//! the outbound ports.

pub mod illustration_service;
pub mod llm;
pub mod section_splitter;
pub mod storybook_service;

pub use illustration_service::{IllustrationService, RemoteGeneration};
pub use storybook_service::{
    StorybookError, StorybookOutcome, StorybookRequest, StorybookService, StorybookSettings,
};
