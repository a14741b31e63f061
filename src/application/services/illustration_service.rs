//! Illustration Service - One image per section slot, never failing
//!
//! Remote generation runs as a fallback chain: caption (or a fixed caption
//! template), then each image provider in order. Anything that is still
//! unrecovered ends in a deterministic placeholder painted locally.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::application::ports::outbound::{
    GenerationError, ImageGenerationPort, ImageProcessingPort, LlmPort, PlaceholderScene,
};
use crate::application::services::llm::prompt_builder::{
    build_caption_request, build_image_prompt, clean_caption, fallback_caption,
};
use crate::domain::entities::{ImageMime, Illustration, IllustrationOrigin, COVER_INDEX};
use crate::domain::value_objects::{scheme_for, StoryContext};

/// Last-resort 1x1 white PNG for when even placeholder rasterization fails
const FALLBACK_PNG: [u8; 69] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
    0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8,
    0xFF, 0xFF, 0x3F, 0x00, 0x05, 0xFE, 0x02, 0xFE, 0x0D, 0xEF, 0x46, 0xB8, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Which slot an illustration is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllustrationSlot<'a> {
    Cover,
    Section {
        index: usize,
        total: usize,
        text: &'a str,
    },
}

impl IllustrationSlot<'_> {
    pub fn index(&self) -> usize {
        match self {
            Self::Cover => COVER_INDEX,
            Self::Section { index, .. } => *index,
        }
    }
}

/// Remote collaborators, present only when generation is enabled and a
/// credential is configured
#[derive(Clone)]
pub struct RemoteGeneration {
    pub captioner: Option<Arc<dyn LlmPort>>,
    /// Tried in order; the first non-empty image wins
    pub providers: Vec<Arc<dyn ImageGenerationPort>>,
}

pub struct IllustrationService {
    remote: Option<RemoteGeneration>,
    imaging: Arc<dyn ImageProcessingPort>,
}

impl IllustrationService {
    pub fn new(imaging: Arc<dyn ImageProcessingPort>, remote: Option<RemoteGeneration>) -> Self {
        let remote = remote.filter(|r| !r.providers.is_empty());
        Self { remote, imaging }
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Produce the illustration for a slot. Always returns usable image bytes.
    #[instrument(skip(self, slot, story), fields(section = slot.index()))]
    pub async fn illustrate(&self, slot: &IllustrationSlot<'_>, story: &StoryContext) -> Illustration {
        if let Some(remote) = &self.remote {
            match self.generate_remote(remote, slot, story).await {
                Ok(illustration) => return illustration,
                Err(e) => warn!("Remote illustration failed, using placeholder: {}", e),
            }
        }

        self.placeholder(slot, story).await
    }

    async fn generate_remote(
        &self,
        remote: &RemoteGeneration,
        slot: &IllustrationSlot<'_>,
        story: &StoryContext,
    ) -> Result<Illustration, GenerationError> {
        let caption = self.caption_for(remote, slot, story).await;
        let prompt = build_image_prompt(&caption);
        let bytes = self.synthesize(remote, &prompt).await?;
        self.post_process(slot.index(), bytes).await
    }

    async fn caption_for(
        &self,
        remote: &RemoteGeneration,
        slot: &IllustrationSlot<'_>,
        story: &StoryContext,
    ) -> String {
        let Some(captioner) = &remote.captioner else {
            return fallback_caption(slot, story);
        };

        match captioner.generate(build_caption_request(slot, story)).await {
            Ok(response) => match clean_caption(&response.content) {
                Some(caption) => {
                    debug!(model = %response.model, "Caption: {}", caption);
                    caption
                }
                None => {
                    debug!("Captioner returned no usable text, using template");
                    fallback_caption(slot, story)
                }
            },
            Err(e) => {
                log_generation_failure("captioner", &e);
                fallback_caption(slot, story)
            }
        }
    }

    async fn synthesize(
        &self,
        remote: &RemoteGeneration,
        prompt: &str,
    ) -> Result<Vec<u8>, GenerationError> {
        let mut last_error = GenerationError::Incomplete("no image providers configured".into());

        for provider in &remote.providers {
            match provider.synthesize_image(prompt).await {
                Ok(bytes) if bytes.is_empty() => {
                    log_generation_failure(provider.provider_name(), &GenerationError::EmptyBody);
                    last_error = GenerationError::EmptyBody;
                }
                Ok(bytes) => {
                    info!(
                        provider = provider.provider_name(),
                        bytes = bytes.len(),
                        "Image generated"
                    );
                    return Ok(bytes);
                }
                Err(e) => {
                    log_generation_failure(provider.provider_name(), &e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Downscale and re-encode; on failure keep the original bytes if they
    /// are a recognizable image.
    async fn post_process(
        &self,
        section_index: usize,
        bytes: Vec<u8>,
    ) -> Result<Illustration, GenerationError> {
        let imaging = self.imaging.clone();
        let (original, normalized) = tokio::task::spawn_blocking(move || {
            let normalized = imaging.normalize(&bytes);
            (bytes, normalized)
        })
        .await
        .map_err(|e| GenerationError::Malformed(format!("post-processing panicked: {}", e)))?;

        match normalized {
            Ok(image) => Ok(Illustration {
                owner_section_index: section_index,
                bytes: image.bytes,
                mime: image.mime,
                origin: IllustrationOrigin::Generated,
            }),
            Err(e) => {
                let mime = ImageMime::sniff(&original);
                if mime == ImageMime::Unknown {
                    return Err(GenerationError::Malformed(format!(
                        "unrecognized image payload: {}",
                        e
                    )));
                }
                warn!("Re-encoding failed, passing original {} through: {}", mime, e);
                Ok(Illustration {
                    owner_section_index: section_index,
                    bytes: original,
                    mime,
                    origin: IllustrationOrigin::Generated,
                })
            }
        }
    }

    /// Paint the deterministic placeholder for a slot
    pub async fn placeholder(&self, slot: &IllustrationSlot<'_>, story: &StoryContext) -> Illustration {
        let scene = placeholder_scene(slot, story);
        let imaging = self.imaging.clone();

        let rendered = tokio::task::spawn_blocking(move || imaging.render_placeholder(&scene))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));

        let bytes = rendered.unwrap_or_else(|e| {
            warn!("Placeholder rendering failed, using blank image: {}", e);
            FALLBACK_PNG.to_vec()
        });

        Illustration {
            owner_section_index: slot.index(),
            bytes,
            mime: ImageMime::Png,
            origin: IllustrationOrigin::Placeholder,
        }
    }
}

/// Scheme and labels for a placeholder; pure in slot index, section count
/// and protagonist
pub fn placeholder_scene(slot: &IllustrationSlot<'_>, story: &StoryContext) -> PlaceholderScene {
    let (label, badge_text) = match slot {
        IllustrationSlot::Cover => ("Cover".to_string(), "\u{2605}".to_string()),
        IllustrationSlot::Section { index, total, .. } => {
            (format!("Section {} of {}", index, total), index.to_string())
        }
    };

    PlaceholderScene {
        scheme: scheme_for(slot.index()),
        protagonist: story.protagonist.clone(),
        label,
        badge_text,
    }
}

fn log_generation_failure(stage: &str, error: &GenerationError) {
    if error.is_auth_failure() {
        warn!(
            stage,
            "Generation credential missing or rejected, check OPENAI_API_KEY: {}", error
        );
    } else {
        warn!(stage, "Generation step failed: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::application::ports::outbound::{ImagingError, LlmRequest, LlmResponse, NormalizedImage};

    const JPEG_BYTES: [u8; 6] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    struct MockImaging {
        fail_normalize: bool,
    }

    impl ImageProcessingPort for MockImaging {
        fn render_placeholder(&self, scene: &PlaceholderScene) -> Result<Vec<u8>, ImagingError> {
            let mut bytes = vec![0x89, b'P', b'N', b'G'];
            bytes.extend_from_slice(scene.scheme.name.as_bytes());
            Ok(bytes)
        }

        fn normalize(&self, bytes: &[u8]) -> Result<NormalizedImage, ImagingError> {
            if self.fail_normalize {
                return Err(ImagingError::Decode("bad data".to_string()));
            }
            Ok(NormalizedImage {
                bytes: [&JPEG_BYTES[..], bytes].concat(),
                mime: ImageMime::Jpeg,
            })
        }
    }

    struct MockProvider {
        name: &'static str,
        result: Result<Vec<u8>, u16>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl MockProvider {
        fn new(name: &'static str, result: Result<Vec<u8>, u16>) -> Arc<Self> {
            Arc::new(Self {
                name,
                result,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageGenerationPort for MockProvider {
        fn provider_name(&self) -> &str {
            self.name
        }

        async fn synthesize_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.result {
                Ok(bytes) => Ok(bytes.clone()),
                Err(status) => Err(GenerationError::Api {
                    status: *status,
                    message: "boom".to_string(),
                }),
            }
        }
    }

    struct MockLlm {
        reply: Option<String>,
    }

    #[async_trait]
    impl LlmPort for MockLlm {
        async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, GenerationError> {
            match &self.reply {
                Some(content) => Ok(LlmResponse {
                    content: content.clone(),
                    model: "mock".to_string(),
                }),
                None => Err(GenerationError::Transport("timed out".to_string())),
            }
        }
    }

    fn story() -> StoryContext {
        StoryContext::new(None, Some("Luna"), Some("the Whispering Woods"), None)
    }

    fn section(index: usize) -> IllustrationSlot<'static> {
        IllustrationSlot::Section {
            index,
            total: 5,
            text: "Luna found a glowing mushroom.",
        }
    }

    fn service_with(
        providers: Vec<Arc<MockProvider>>,
        reply: Option<&str>,
        fail_normalize: bool,
    ) -> IllustrationService {
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn ImageGenerationPort>)
            .collect();
        IllustrationService::new(
            Arc::new(MockImaging { fail_normalize }),
            Some(RemoteGeneration {
                captioner: Some(Arc::new(MockLlm {
                    reply: reply.map(str::to_string),
                })),
                providers,
            }),
        )
    }

    #[tokio::test]
    async fn test_disabled_generation_uses_placeholder() {
        let service = IllustrationService::new(Arc::new(MockImaging { fail_normalize: false }), None);
        assert!(!service.remote_enabled());

        let illustration = service.illustrate(&section(2), &story()).await;
        assert_eq!(illustration.origin, IllustrationOrigin::Placeholder);
        assert_eq!(illustration.mime, ImageMime::Png);
        assert_eq!(illustration.owner_section_index, 2);
        assert!(!illustration.bytes.is_empty());
    }

    #[tokio::test]
    async fn test_remote_without_providers_is_disabled() {
        let service = IllustrationService::new(
            Arc::new(MockImaging { fail_normalize: false }),
            Some(RemoteGeneration {
                captioner: None,
                providers: vec![],
            }),
        );
        assert!(!service.remote_enabled());
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let primary = MockProvider::new("primary", Ok(vec![1, 2, 3]));
        let secondary = MockProvider::new("secondary", Ok(vec![9]));
        let service = service_with(vec![primary.clone(), secondary.clone()], Some("A caption"), false);

        let illustration = service.illustrate(&section(1), &story()).await;
        assert_eq!(illustration.origin, IllustrationOrigin::Generated);
        assert_eq!(illustration.mime, ImageMime::Jpeg);
        assert!(illustration.bytes.ends_with(&[1, 2, 3]));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_secondary_provider_used_after_primary_failure() {
        let primary = MockProvider::new("primary", Err(500));
        let secondary = MockProvider::new("secondary", Ok(vec![7, 7]));
        let service = service_with(vec![primary.clone(), secondary.clone()], Some("A caption"), false);

        let illustration = service.illustrate(&IllustrationSlot::Cover, &story()).await;
        assert_eq!(illustration.origin, IllustrationOrigin::Generated);
        assert_eq!(illustration.owner_section_index, 0);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_providers_failing_falls_back_to_placeholder() {
        let primary = MockProvider::new("primary", Err(401));
        let secondary = MockProvider::new("secondary", Ok(vec![]));
        let service = service_with(vec![primary.clone(), secondary.clone()], None, false);

        let illustration = service.illustrate(&section(3), &story()).await;
        assert_eq!(illustration.origin, IllustrationOrigin::Placeholder);
        assert_eq!(illustration.mime, ImageMime::Png);
        assert!(!illustration.bytes.is_empty());
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_caption_used_in_prompt() {
        let provider = MockProvider::new("primary", Ok(vec![5]));
        let service = service_with(vec![provider.clone()], Some("\"Luna hugs a tree.\""), false);

        service.illustrate(&section(1), &story()).await;
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].starts_with("Luna hugs a tree. Children's storybook"));
    }

    #[tokio::test]
    async fn test_caption_failure_uses_template() {
        let provider = MockProvider::new("primary", Ok(vec![5]));
        let service = service_with(vec![provider.clone()], None, false);

        let illustration = service.illustrate(&section(4), &story()).await;
        assert_eq!(illustration.origin, IllustrationOrigin::Generated);

        let prompts = provider.prompts.lock().unwrap();
        let expected = fallback_caption(&section(4), &story());
        assert!(prompts[0].starts_with(&expected));
    }

    #[tokio::test]
    async fn test_reencode_failure_passes_original_through() {
        let provider = MockProvider::new("primary", Ok(JPEG_BYTES.to_vec()));
        let service = service_with(vec![provider], Some("caption"), true);

        let illustration = service.illustrate(&section(1), &story()).await;
        assert_eq!(illustration.origin, IllustrationOrigin::Generated);
        assert_eq!(illustration.mime, ImageMime::Jpeg);
        assert_eq!(illustration.bytes, JPEG_BYTES.to_vec());
    }

    #[tokio::test]
    async fn test_unrecognized_payload_falls_back_to_placeholder() {
        let provider = MockProvider::new("primary", Ok(b"<html>error</html>".to_vec()));
        let service = service_with(vec![provider], Some("caption"), true);

        let illustration = service.illustrate(&section(1), &story()).await;
        assert_eq!(illustration.origin, IllustrationOrigin::Placeholder);
    }

    #[test]
    fn test_placeholder_scene_is_deterministic() {
        let first = placeholder_scene(&section(2), &story());
        let second = placeholder_scene(&section(2), &story());
        assert_eq!(first, second);
        assert_eq!(first.label, "Section 2 of 5");
        assert_eq!(first.badge_text, "2");
        assert_eq!(first.protagonist, "Luna");
        assert_eq!(first.scheme, scheme_for(2));

        let cover = placeholder_scene(&IllustrationSlot::Cover, &story());
        assert_eq!(cover.label, "Cover");
        assert_eq!(cover.scheme, scheme_for(0));
    }

    #[tokio::test]
    async fn test_placeholder_bytes_follow_scheme() {
        let service = IllustrationService::new(Arc::new(MockImaging { fail_normalize: false }), None);
        let a = service.illustrate(&section(1), &story()).await;
        let b = service.illustrate(&section(7), &story()).await;
        let c = service.illustrate(&section(2), &story()).await;
        assert_eq!(a.bytes, b.bytes);
        assert_ne!(a.bytes, c.bytes);
    }
}
