//! Section entity - One body-text unit with an illustration slot

use serde::{Deserialize, Serialize};

/// Index reserved for the cover illustration
pub const COVER_INDEX: usize = 0;

/// A section of the story. Index 0 is the cover and carries no text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub index: usize,
    pub text: String,
}

impl Section {
    /// Number body sections 1..=N in narrative order
    pub fn from_texts(texts: Vec<String>) -> Vec<Self> {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Self { index: i + 1, text })
            .collect()
    }
}
