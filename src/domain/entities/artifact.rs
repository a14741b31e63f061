//! Stored artifact and its retrieval reference

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Handle sufficient on its own to fetch stored bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetrievalReference {
    /// Time-bounded download URL minted by the object store
    SignedUrl {
        url: String,
        expires_at: DateTime<Utc>,
    },
    /// Path served by this service's retrieval endpoint
    LocalPath { path: String },
}

impl RetrievalReference {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SignedUrl { url, .. } => url,
            Self::LocalPath { path } => path,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::SignedUrl { expires_at, .. } => Some(*expires_at),
            Self::LocalPath { .. } => None,
        }
    }
}

/// A persisted storybook
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    /// Sanitized name the artifact was stored under
    pub filename: String,
    pub reference: RetrievalReference,
    pub size_bytes: usize,
}
