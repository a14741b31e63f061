//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::application::ports::outbound::{ArtifactStorePort, ImageGenerationPort, LlmPort};
use crate::application::services::{IllustrationService, RemoteGeneration, StorybookService};
use crate::infrastructure::comfyui::ComfyUIClient;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::document::PdfAssembler;
use crate::infrastructure::imaging::ImageProcessor;
use crate::infrastructure::openai::{ImageDelivery, OpenAIClient};
use crate::infrastructure::storage::{LocalScratchStore, RemoteObjectStore};

/// Shared application state
pub struct AppState {
    pub storybook_service: StorybookService,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.generation.timeout_secs);

        // Image processing backs both placeholders and generated images
        let imaging = Arc::new(ImageProcessor::new(
            config.image_max_dimension,
            config.jpeg_quality,
        ));

        let remote = build_remote_generation(&config, timeout)?;
        let illustrations = Arc::new(IllustrationService::new(imaging, remote));

        let store: Arc<dyn ArtifactStorePort> = match &config.storage {
            Some(storage) => {
                let store = RemoteObjectStore::new(storage, timeout)
                    .context("Failed to create object storage client")?;
                info!(bucket = %storage.bucket, "Storing storybooks in object storage");
                Arc::new(store)
            }
            None => {
                info!(
                    dir = %config.scratch_dir.display(),
                    "Object storage not configured, storing storybooks locally"
                );
                Arc::new(LocalScratchStore::new(&config.scratch_dir))
            }
        };

        let storybook_service = StorybookService::new(
            config.storybook.clone(),
            illustrations,
            Arc::new(PdfAssembler::new()),
            store,
        );

        Ok(Self { storybook_service })
    }
}

/// Provider chain for remote illustration, or `None` for placeholders only
fn build_remote_generation(
    config: &AppConfig,
    timeout: Duration,
) -> Result<Option<RemoteGeneration>> {
    let generation = &config.generation;
    let api_key = match (&generation.api_key, generation.enabled) {
        (Some(api_key), true) => api_key,
        (_, false) => {
            info!("Remote generation disabled, using placeholder illustrations");
            return Ok(None);
        }
        (None, true) => {
            warn!("OPENAI_API_KEY not set, using placeholder illustrations");
            return Ok(None);
        }
    };

    let openai = Arc::new(
        OpenAIClient::new(generation, api_key).context("Failed to create OpenAI client")?,
    );
    // Same service, second call surface: hosted URL plus a separate download
    let hosted = Arc::new(
        OpenAIClient::new(generation, api_key)
            .context("Failed to create OpenAI client")?
            .with_delivery(ImageDelivery::Hosted),
    );
    let captioner: Arc<dyn LlmPort> = openai.clone();
    let mut providers: Vec<Arc<dyn ImageGenerationPort>> = vec![openai, hosted];

    if let Some(comfyui) = &config.comfyui {
        let client =
            ComfyUIClient::new(comfyui, timeout).context("Failed to create ComfyUI client")?;
        info!(base_url = %comfyui.base_url, "ComfyUI registered as last-resort image provider");
        providers.push(Arc::new(client));
    }

    info!(
        caption_model = %generation.caption_model,
        image_model = %generation.image_model,
        providers = providers.len(),
        "Remote generation enabled"
    );
    Ok(Some(RemoteGeneration {
        captioner: Some(captioner),
        providers,
    }))
}
