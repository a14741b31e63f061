//! Imaging - Placeholder artwork and generated-image post-processing

mod placeholder;
mod processor;

pub use processor::ImageProcessor;
