//! Rendered document metadata

use serde::{Deserialize, Serialize};

/// What a physical page holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "section", rename_all = "snake_case")]
pub enum PageKind {
    Title,
    TableOfContents,
    Section(usize),
    Appendix,
}

/// A page after numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based display number
    pub number: usize,
    pub kind: PageKind,
}

/// A table-of-contents entry with its resolved target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub label: String,
    pub target: PageKind,
    /// Display number of the first page of `target`
    pub page_number: usize,
}

/// A finished storybook PDF plus the layout facts used to build it
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub pages: Vec<PageInfo>,
    pub contents: Vec<TocEntry>,
}

impl RenderedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
