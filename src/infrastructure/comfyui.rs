//! ComfyUI client, the optional last-resort image generation channel

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::application::ports::outbound::{GenerationError, ImageGenerationPort};
use crate::infrastructure::config::ComfyUIConfig;

const NEGATIVE_PROMPT: &str = "text, watermark, signature, scary, violent, blurry, deformed";

/// Node that receives the positive prompt in the built-in workflow
const PROMPT_NODE: &str = "6";

/// Client for ComfyUI API
pub struct ComfyUIClient {
    client: Client,
    base_url: String,
    checkpoint: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl ComfyUIClient {
    pub fn new(config: &ComfyUIConfig, timeout: Duration) -> Result<Self, ComfyUIError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            checkpoint: config.checkpoint.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls.max(1),
        })
    }

    /// Queue a workflow for execution
    pub async fn queue_prompt(
        &self,
        workflow: serde_json::Value,
    ) -> Result<QueueResponse, ComfyUIError> {
        let request = QueuePromptRequest {
            prompt: workflow,
            client_id: Uuid::new_v4().to_string(),
        };

        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await?;
            return Err(ComfyUIError::ApiError(status, error_text));
        }

        let queue_response: QueueResponse = response.json().await?;
        Ok(queue_response)
    }

    /// Get the history of a prompt; empty until the prompt finishes
    pub async fn get_history(&self, prompt_id: &str) -> Result<HistoryResponse, ComfyUIError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.base_url, prompt_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await?;
            return Err(ComfyUIError::ApiError(status, error_text));
        }

        let history: HistoryResponse = response.json().await?;
        Ok(history)
    }

    /// Download a generated image
    pub async fn get_image(&self, image: &ImageOutput) -> Result<Vec<u8>, ComfyUIError> {
        let response = self
            .client
            .get(format!("{}/view", self.base_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.r#type.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await?;
            return Err(ComfyUIError::ApiError(status, error_text));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Poll history until the prompt completes and report its first image
    async fn wait_for_image(&self, prompt_id: &str) -> Result<ImageOutput, ComfyUIError> {
        for attempt in 0..self.max_polls {
            let mut history = self.get_history(prompt_id).await?;

            if let Some(entry) = history.prompts.remove(prompt_id) {
                if entry.status.status_str == "error" {
                    return Err(ComfyUIError::Failed(format!(
                        "prompt {} failed in ComfyUI",
                        prompt_id
                    )));
                }
                if entry.status.completed {
                    return entry
                        .outputs
                        .into_values()
                        .filter_map(|output| output.images)
                        .flatten()
                        .next()
                        .ok_or_else(|| {
                            ComfyUIError::Failed(format!("prompt {} produced no images", prompt_id))
                        });
                }
            }

            debug!(prompt_id, attempt, "ComfyUI prompt still running");
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(ComfyUIError::TimedOut(self.max_polls))
    }

    /// Minimal text-to-image workflow for the configured checkpoint
    pub fn txt2img_workflow(&self, prompt: &str) -> serde_json::Value {
        let seed = prompt_seed(prompt);

        json!({
            "3": {
                "class_type": "KSampler",
                "inputs": {
                    "seed": seed,
                    "steps": 25,
                    "cfg": 7,
                    "sampler_name": "euler",
                    "scheduler": "normal",
                    "denoise": 1,
                    "model": ["4", 0],
                    "positive": [PROMPT_NODE, 0],
                    "negative": ["7", 0],
                    "latent_image": ["5", 0]
                }
            },
            "4": {
                "class_type": "CheckpointLoaderSimple",
                "inputs": { "ckpt_name": self.checkpoint }
            },
            "5": {
                "class_type": "EmptyLatentImage",
                "inputs": { "width": 1024, "height": 1024, "batch_size": 1 }
            },
            PROMPT_NODE: {
                "class_type": "CLIPTextEncode",
                "inputs": { "text": prompt, "clip": ["4", 1] }
            },
            "7": {
                "class_type": "CLIPTextEncode",
                "inputs": { "text": NEGATIVE_PROMPT, "clip": ["4", 1] }
            },
            "8": {
                "class_type": "VAEDecode",
                "inputs": { "samples": ["3", 0], "vae": ["4", 2] }
            },
            "9": {
                "class_type": "SaveImage",
                "inputs": { "filename_prefix": "storybook", "images": ["8", 0] }
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ComfyUIError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error ({0}): {1}")]
    ApiError(u16, String),
    #[error("{0}")]
    Failed(String),
    #[error("prompt did not finish after {0} polls")]
    TimedOut(u32),
}

impl From<ComfyUIError> for GenerationError {
    fn from(err: ComfyUIError) -> Self {
        match err {
            ComfyUIError::HttpError(e) if e.is_decode() => GenerationError::Malformed(e.to_string()),
            ComfyUIError::HttpError(e) => GenerationError::Transport(e.to_string()),
            ComfyUIError::ApiError(status, message) => GenerationError::Api { status, message },
            ComfyUIError::Failed(message) => GenerationError::Incomplete(message),
            ComfyUIError::TimedOut(polls) => GenerationError::Incomplete(format!(
                "prompt did not finish after {} polls",
                polls
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct QueuePromptRequest {
    prompt: serde_json::Value,
    client_id: String,
}

#[derive(Debug, Deserialize)]
pub struct QueueResponse {
    pub prompt_id: String,
    #[serde(default)]
    pub number: u32,
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    #[serde(flatten)]
    pub prompts: HashMap<String, PromptHistory>,
}

#[derive(Debug, Deserialize)]
pub struct PromptHistory {
    #[serde(default)]
    pub outputs: HashMap<String, NodeOutput>,
    pub status: PromptStatus,
}

#[derive(Debug, Deserialize)]
pub struct NodeOutput {
    pub images: Option<Vec<ImageOutput>>,
}

#[derive(Debug, Deserialize)]
pub struct ImageOutput {
    pub filename: String,
    pub subfolder: String,
    pub r#type: String,
}

#[derive(Debug, Deserialize)]
pub struct PromptStatus {
    pub status_str: String,
    pub completed: bool,
}

// =============================================================================
// ImageGenerationPort Implementation
// =============================================================================

#[async_trait]
impl ImageGenerationPort for ComfyUIClient {
    fn provider_name(&self) -> &str {
        "comfyui"
    }

    async fn synthesize_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError> {
        let queued = self.queue_prompt(self.txt2img_workflow(prompt)).await?;
        debug!(prompt_id = %queued.prompt_id, position = queued.number, "ComfyUI prompt queued");

        let image = self.wait_for_image(&queued.prompt_id).await?;
        let bytes = self.get_image(&image).await?;
        if bytes.is_empty() {
            return Err(GenerationError::EmptyBody);
        }
        Ok(bytes)
    }
}

/// Sampler seed for a prompt: 64-bit FNV-1a, halved to stay within a signed integer
fn prompt_seed(prompt: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = prompt
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME));
    hash >> 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        extract::{Path, Query},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::Value;

    use crate::infrastructure::test_support::spawn_server;

    fn config(base_url: &str) -> ComfyUIConfig {
        ComfyUIConfig {
            base_url: base_url.to_string(),
            checkpoint: "test.safetensors".to_string(),
            poll_interval_ms: 5,
            max_polls: 3,
        }
    }

    /// ComfyUI stand-in that finishes after `running_polls` history calls
    fn fake_comfyui(running_polls: usize, image: Vec<u8>) -> Router {
        let polls = Arc::new(AtomicUsize::new(0));

        Router::new()
            .route(
                "/prompt",
                post(|Json(body): Json<Value>| async move {
                    let text = &body["prompt"][PROMPT_NODE]["inputs"]["text"];
                    assert_eq!(text, "a sleepy dragon");
                    Json(json!({ "prompt_id": "p-1", "number": 0 }))
                }),
            )
            .route(
                "/history/{id}",
                get(move |Path(id): Path<String>| {
                    let polls = polls.clone();
                    async move {
                        if polls.fetch_add(1, Ordering::SeqCst) < running_polls {
                            return Json(json!({}));
                        }
                        Json(json!({
                            id: {
                                "status": { "status_str": "success", "completed": true },
                                "outputs": {
                                    "9": { "images": [
                                        { "filename": "storybook_0001.png", "subfolder": "", "type": "output" }
                                    ] }
                                }
                            }
                        }))
                    }
                }),
            )
            .route(
                "/view",
                get(move |Query(query): Query<HashMap<String, String>>| {
                    let image = image.clone();
                    async move {
                        assert_eq!(query["filename"], "storybook_0001.png");
                        image
                    }
                }),
            )
    }

    #[tokio::test]
    async fn test_synthesize_polls_until_complete() {
        let base = spawn_server(fake_comfyui(2, vec![4, 5, 6])).await;
        let client = ComfyUIClient::new(&config(&base), Duration::from_secs(5)).unwrap();

        let bytes = client.synthesize_image("a sleepy dragon").await.unwrap();
        assert_eq!(bytes, vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_polls() {
        let base = spawn_server(fake_comfyui(10, vec![1])).await;
        let client = ComfyUIClient::new(&config(&base), Duration::from_secs(5)).unwrap();

        let err = client.synthesize_image("a sleepy dragon").await.unwrap_err();
        assert!(matches!(err, GenerationError::Incomplete(_)));
    }

    #[tokio::test]
    async fn test_empty_image_is_failure() {
        let base = spawn_server(fake_comfyui(0, vec![])).await;
        let client = ComfyUIClient::new(&config(&base), Duration::from_secs(5)).unwrap();

        let err = client.synthesize_image("a sleepy dragon").await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyBody));
    }

    #[test]
    fn test_workflow_is_deterministic_per_prompt() {
        let client = ComfyUIClient::new(&config("http://localhost:8188"), Duration::from_secs(5))
            .unwrap();
        let a = client.txt2img_workflow("a fox");
        let b = client.txt2img_workflow("a fox");
        assert_eq!(a, b);
        assert_eq!(a["4"]["inputs"]["ckpt_name"], "test.safetensors");
        assert_eq!(a[PROMPT_NODE]["inputs"]["text"], "a fox");
    }

    #[test]
    fn test_seed_is_fixed_fnv_hash() {
        assert_eq!(prompt_seed(""), 0xcbf2_9ce4_8422_2325 >> 1);
        assert_eq!(prompt_seed("a"), 0xaf63_dc4c_8601_ec8c >> 1);
        assert_ne!(prompt_seed("a fox"), prompt_seed("a fix"));

        let client = ComfyUIClient::new(&config("http://localhost:8188"), Duration::from_secs(5))
            .unwrap();
        assert_eq!(client.txt2img_workflow("a")["3"]["inputs"]["seed"], prompt_seed("a"));
    }
}
