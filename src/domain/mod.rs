//! Domain layer - Core storybook concepts with no external dependencies
//!
//! This layer contains:
//! - Entities: Section, Illustration, page metadata, stored artifacts
//! - Value Objects: story context, placeholder palette, build identifiers

pub mod entities;
pub mod value_objects;
