//! Document - Storybook PDF layout and serialization

mod assembler;
mod layout;

pub use assembler::PdfAssembler;
