//! Storybook Service - Drives one document build end to end
//!
//! request → split → illustrate every slot (bounded fan-out, full join) →
//! assemble → store → retrieval reference.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::application::ports::outbound::{
    looks_like_auth_failure, ArtifactStorePort, AssemblyError, DocumentInput,
    DocumentRendererPort, StorageError,
};
use crate::application::services::illustration_service::{IllustrationService, IllustrationSlot};
use crate::application::services::section_splitter::{split_sections, strip_branch_markup};
use crate::domain::entities::{Illustration, Section, StoredArtifact};
use crate::domain::value_objects::{BuildId, StoryContext};

const MAX_SLUG_CHARS: usize = 60;

/// Request to build and store a storybook
#[derive(Debug, Clone, Default)]
pub struct StorybookRequest {
    pub narrative: String,
    pub title: Option<String>,
    pub protagonist: Option<String>,
    pub setting: Option<String>,
    pub mission: Option<String>,
    pub section_count: Option<usize>,
}

/// Result of a successful build
#[derive(Debug, Clone)]
pub struct StorybookOutcome {
    pub build_id: BuildId,
    pub artifact: StoredArtifact,
    pub page_count: usize,
    pub section_count: usize,
    pub generated_illustrations: usize,
    pub placeholder_illustrations: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StorybookError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("document assembly failed: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("storing the storybook failed: {0}")]
    Storage(#[from] StorageError),
    #[error("document assembly task failed: {0}")]
    Task(String),
}

impl StorybookError {
    /// Whether the failure points at a missing or rejected credential
    pub fn is_credential_error(&self) -> bool {
        match self {
            Self::InvalidRequest(_) => false,
            Self::Storage(StorageError::Api { status, .. }) if *status == 401 || *status == 403 => {
                true
            }
            other => looks_like_auth_failure(&other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorybookSettings {
    pub default_section_count: usize,
    pub max_section_count: usize,
    pub max_narrative_chars: usize,
    /// Illustrations requested at once; 1 runs them one after another
    pub illustration_concurrency: usize,
}

impl Default for StorybookSettings {
    fn default() -> Self {
        Self {
            default_section_count: 5,
            max_section_count: 12,
            max_narrative_chars: 100_000,
            illustration_concurrency: 4,
        }
    }
}

pub struct StorybookService {
    settings: StorybookSettings,
    illustrations: Arc<IllustrationService>,
    renderer: Arc<dyn DocumentRendererPort>,
    store: Arc<dyn ArtifactStorePort>,
}

impl StorybookService {
    pub fn new(
        settings: StorybookSettings,
        illustrations: Arc<IllustrationService>,
        renderer: Arc<dyn DocumentRendererPort>,
        store: Arc<dyn ArtifactStorePort>,
    ) -> Self {
        Self {
            settings,
            illustrations,
            renderer,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStorePort> {
        &self.store
    }

    fn validate_request(&self, request: &StorybookRequest) -> Result<(), StorybookError> {
        if request.narrative.trim().is_empty() {
            return Err(StorybookError::InvalidRequest(
                "narrativeText is required".to_string(),
            ));
        }
        if request.narrative.chars().count() > self.settings.max_narrative_chars {
            return Err(StorybookError::InvalidRequest(format!(
                "narrativeText cannot exceed {} characters",
                self.settings.max_narrative_chars
            )));
        }
        Ok(())
    }

    /// Build, assemble and store a storybook for the narrative
    #[instrument(skip(self, request), fields(build_id = tracing::field::Empty))]
    pub async fn create_storybook(
        &self,
        request: StorybookRequest,
    ) -> Result<StorybookOutcome, StorybookError> {
        self.validate_request(&request)?;

        let build_id = BuildId::new();
        tracing::Span::current().record("build_id", tracing::field::display(build_id));

        let story = StoryContext::new(
            request.title.as_deref(),
            request.protagonist.as_deref(),
            request.setting.as_deref(),
            request.mission.as_deref(),
        );

        let target = request
            .section_count
            .unwrap_or(self.settings.default_section_count)
            .clamp(1, self.settings.max_section_count.max(1));
        let sections = Section::from_texts(split_sections(&request.narrative, target));
        info!(
            target,
            sections = sections.len(),
            remote = self.illustrations.remote_enabled(),
            "Narrative split"
        );

        let illustrations = self.illustrate_all(&sections, &story).await;
        let placeholder_illustrations = illustrations.iter().filter(|i| i.is_placeholder()).count();
        let generated_illustrations = illustrations.len() - placeholder_illustrations;
        info!(
            generated = generated_illustrations,
            placeholder = placeholder_illustrations,
            "Illustrations resolved"
        );

        let section_count = sections.len();
        let input = DocumentInput {
            title: story.title.clone(),
            narrative: strip_branch_markup(&request.narrative),
            sections,
            illustrations,
        };
        let renderer = self.renderer.clone();
        let document = tokio::task::spawn_blocking(move || renderer.render(input))
            .await
            .map_err(|e| StorybookError::Task(e.to_string()))??;
        let page_count = document.page_count();
        info!(pages = page_count, bytes = document.bytes.len(), "Document assembled");

        let filename = storybook_filename(&story.title, Utc::now());
        let artifact = self
            .store
            .store(document.bytes, &filename)
            .await
            .inspect_err(|e| warn!(backend = self.store.backend_name(), "Store failed: {}", e))?;
        info!(
            backend = self.store.backend_name(),
            filename = %artifact.filename,
            "Storybook stored"
        );

        Ok(StorybookOutcome {
            build_id,
            artifact,
            page_count,
            section_count,
            generated_illustrations,
            placeholder_illustrations,
        })
    }

    /// Resolve the cover and every section illustration, ordered by index
    async fn illustrate_all(&self, sections: &[Section], story: &StoryContext) -> Vec<Illustration> {
        let total = sections.len();
        let slots: Vec<IllustrationSlot<'_>> = std::iter::once(IllustrationSlot::Cover)
            .chain(sections.iter().map(|s| IllustrationSlot::Section {
                index: s.index,
                total,
                text: &s.text,
            }))
            .collect();

        let semaphore = Semaphore::new(self.settings.illustration_concurrency.max(1));
        let semaphore = &semaphore;
        let tasks = slots.iter().map(|slot| async move {
            let _permit = semaphore.acquire().await.ok();
            self.illustrations.illustrate(slot, story).await
        });

        let mut illustrations = join_all(tasks).await;
        illustrations.sort_by_key(|i| i.owner_section_index);
        illustrations
    }
}

/// `<slug>-<UTC timestamp with microseconds>.pdf`
pub fn storybook_filename(title: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}.pdf", slugify(title), now.format("%Y%m%dT%H%M%S%6fZ"))
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
        if slug.len() >= MAX_SLUG_CHARS {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "storybook".to_string()
    } else {
        slug.to_string()
    }
}
