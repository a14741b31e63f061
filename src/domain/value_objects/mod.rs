//! Value objects - Immutable objects defined by their attributes

mod ids;
mod palette;
mod story_context;

pub use ids::BuildId;
pub use palette::{scheme_for, PlaceholderScheme};
pub use story_context::StoryContext;
