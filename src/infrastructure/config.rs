//! Application configuration

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::services::StorybookSettings;

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP server port
    pub server_port: u16,

    pub generation: GenerationConfig,
    pub comfyui: Option<ComfyUIConfig>,
    /// Remote object storage; `None` selects the local scratch directory
    pub storage: Option<ObjectStorageConfig>,

    /// Local backend storage root
    pub scratch_dir: PathBuf,

    pub storybook: StorybookSettings,
    /// Longest edge of re-encoded generated images
    pub image_max_dimension: u32,
    pub jpeg_quality: u8,
}

/// OpenAI-compatible text and image generation
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub caption_model: String,
    pub image_model: String,
    pub image_size: String,
    pub timeout_secs: u64,
}

impl GenerationConfig {
    /// Remote generation runs only when enabled and a credential is present
    pub fn is_remote_available(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }
}

/// Self-hosted ComfyUI, tried after both OpenAI call surfaces
#[derive(Debug, Clone)]
pub struct ComfyUIConfig {
    pub base_url: String,
    pub checkpoint: String,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

/// Supabase-style storage REST API
#[derive(Debug, Clone)]
pub struct ObjectStorageConfig {
    /// e.g. `https://<project>.supabase.co/storage/v1`
    pub base_url: String,
    pub api_key: String,
    pub bucket: String,
    pub key_prefix: String,
    pub signed_url_ttl_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let storybook_defaults = StorybookSettings::default();

        let generation = GenerationConfig {
            enabled: env_flag("STORYBOOK_GENERATION_ENABLED", true)?,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: non_empty_var("OPENAI_API_KEY"),
            caption_model: env::var("OPENAI_CAPTION_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            image_model: env::var("OPENAI_IMAGE_MODEL")
                .unwrap_or_else(|_| "dall-e-3".to_string()),
            image_size: env::var("OPENAI_IMAGE_SIZE").unwrap_or_else(|_| "1024x1024".to_string()),
            timeout_secs: env_parse("STORYBOOK_HTTP_TIMEOUT_SECS", 60)?,
        };

        let comfyui = match non_empty_var("COMFYUI_BASE_URL") {
            Some(base_url) => Some(ComfyUIConfig {
                base_url,
                checkpoint: env::var("COMFYUI_CHECKPOINT")
                    .unwrap_or_else(|_| "sd_xl_base_1.0.safetensors".to_string()),
                poll_interval_ms: env_parse("COMFYUI_POLL_INTERVAL_MS", 1000)?,
                max_polls: env_parse("COMFYUI_MAX_POLLS", 120)?,
            }),
            None => None,
        };

        let storage = match (non_empty_var("STORAGE_BASE_URL"), non_empty_var("STORAGE_API_KEY")) {
            (Some(base_url), Some(api_key)) => Some(ObjectStorageConfig {
                base_url,
                api_key,
                bucket: env::var("STORAGE_BUCKET").unwrap_or_else(|_| "storybooks".to_string()),
                key_prefix: env::var("STORAGE_KEY_PREFIX")
                    .unwrap_or_else(|_| "storybooks".to_string()),
                signed_url_ttl_secs: env_parse("STORAGE_SIGNED_URL_TTL_SECS", 3600)?,
            }),
            _ => None,
        };

        Ok(Self {
            server_port: env_parse("SERVER_PORT", 3000)?,
            generation,
            comfyui,
            storage,
            scratch_dir: non_empty_var("STORYBOOK_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("storybooks")),
            storybook: StorybookSettings {
                default_section_count: env_parse(
                    "STORYBOOK_SECTION_COUNT",
                    storybook_defaults.default_section_count,
                )?,
                max_section_count: env_parse(
                    "STORYBOOK_MAX_SECTION_COUNT",
                    storybook_defaults.max_section_count,
                )?,
                max_narrative_chars: env_parse(
                    "STORYBOOK_MAX_NARRATIVE_CHARS",
                    storybook_defaults.max_narrative_chars,
                )?,
                illustration_concurrency: env_parse(
                    "STORYBOOK_ILLUSTRATION_CONCURRENCY",
                    storybook_defaults.illustration_concurrency,
                )?,
            },
            image_max_dimension: env_parse("STORYBOOK_IMAGE_MAX_DIMENSION", 1024)?,
            jpeg_quality: env_parse("STORYBOOK_JPEG_QUALITY", 82)?,
        })
    }

    /// Placeholder-only configuration with local storage, used by tests
    #[cfg(test)]
    pub fn local_only(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_port: 0,
            generation: GenerationConfig {
                enabled: false,
                base_url: "http://127.0.0.1:9".to_string(),
                api_key: None,
                caption_model: "test".to_string(),
                image_model: "test".to_string(),
                image_size: "256x256".to_string(),
                timeout_secs: 5,
            },
            comfyui: None,
            storage: None,
            scratch_dir: scratch_dir.into(),
            storybook: StorybookSettings::default(),
            image_max_dimension: 1024,
            jpeg_quality: 82,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid {}", key, std::any::type_name::<T>())),
        None => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> Result<bool> {
    match non_empty_var(key) {
        Some(value) => parse_flag(&value).with_context(|| format!("{} must be true or false", key)),
        None => Ok(default),
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognized flag value '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(parse_flag(" on ").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn test_remote_requires_credential() {
        let mut config = AppConfig::local_only("/tmp/x").generation;
        config.enabled = true;
        assert!(!config.is_remote_available());
        config.api_key = Some("sk-test".to_string());
        assert!(config.is_remote_available());
        config.enabled = false;
        assert!(!config.is_remote_available());
    }
}
