//! OpenAI-compatible client for illustration captions and image synthesis

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ports::outbound::{
    GenerationError, ImageGenerationPort, LlmPort, LlmRequest, LlmResponse, MessageRole,
};
use crate::infrastructure::config::GenerationConfig;

/// How the images endpoint hands back a generated picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDelivery {
    /// Whatever the endpoint returns by default, inline or hosted
    Default,
    /// Ask for a hosted URL and download it in a second request
    Hosted,
}

/// Client for the chat completions and images endpoints
pub struct OpenAIClient {
    client: Client,
    base_url: String,
    api_key: String,
    caption_model: String,
    image_model: String,
    image_size: String,
    delivery: ImageDelivery,
}

impl OpenAIClient {
    pub fn new(config: &GenerationConfig, api_key: &str) -> Result<Self, OpenAIError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            caption_model: config.caption_model.clone(),
            image_model: config.image_model.clone(),
            image_size: config.image_size.clone(),
            delivery: ImageDelivery::Default,
        })
    }

    pub fn with_delivery(mut self, delivery: ImageDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Run a chat completion
    pub async fn chat_completion(
        &self,
        request: &LlmRequest,
    ) -> Result<ChatCompletionResponse, OpenAIError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_prompt {
            messages.push(WireMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| WireMessage {
            role: role_name(m.role),
            content: m.content.clone(),
        }));

        let body = ChatCompletionRequest {
            model: &self.caption_model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Request one image for the prompt
    pub async fn generate_image(&self, prompt: &str) -> Result<ImageData, OpenAIError> {
        let body = ImageGenerationRequest {
            model: &self.image_model,
            prompt,
            n: 1,
            size: &self.image_size,
            response_format: match self.delivery {
                ImageDelivery::Default => None,
                ImageDelivery::Hosted => Some("url"),
            },
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let images: ImageGenerationResponse = response.json().await?;
        images
            .data
            .into_iter()
            .next()
            .ok_or_else(|| OpenAIError::Malformed("response contained no images".to_string()))
    }

    /// Download a generated image from its hosted URL
    pub async fn download_image(&self, url: &str) -> Result<Vec<u8>, OpenAIError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(OpenAIError::EmptyBody);
        }
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAIError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("empty response body")]
    EmptyBody,
}

impl From<OpenAIError> for GenerationError {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::HttpError(e) if e.is_decode() => GenerationError::Malformed(e.to_string()),
            OpenAIError::HttpError(e) => GenerationError::Transport(e.to_string()),
            OpenAIError::ApiError { status, message } => GenerationError::Api { status, message },
            OpenAIError::Malformed(message) => GenerationError::Malformed(message),
            OpenAIError::EmptyBody => GenerationError::EmptyBody,
        }
    }
}

/// Turn a non-success response into an error, preferring the API's own message
async fn api_error(response: reqwest::Response) -> OpenAIError {
    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return OpenAIError::HttpError(e),
    };

    let message = serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|envelope| envelope.error.message)
        .unwrap_or(text);

    OpenAIError::ApiError { status, message }
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub total_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Vec<ImageData>,
}

/// One generated image, either inline or hosted
#[derive(Debug, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub b64_json: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// Port Implementations
// =============================================================================

#[async_trait]
impl LlmPort for OpenAIClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, GenerationError> {
        let response = self.chat_completion(&request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Malformed("completion had no content".to_string()))?;

        if let Some(usage) = &response.usage {
            debug!(model = %response.model, tokens = usage.total_tokens, "Caption completion");
        }

        Ok(LlmResponse {
            content,
            model: response.model,
        })
    }
}

#[async_trait]
impl ImageGenerationPort for OpenAIClient {
    fn provider_name(&self) -> &str {
        match self.delivery {
            ImageDelivery::Default => "openai-images",
            ImageDelivery::Hosted => "openai-images-hosted",
        }
    }

    async fn synthesize_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError> {
        let image = self.generate_image(prompt).await?;

        let bytes = match (image.b64_json, image.url) {
            (Some(encoded), _) => base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| GenerationError::Malformed(format!("invalid base64 image: {}", e)))?,
            (None, Some(url)) => self.download_image(&url).await?,
            (None, None) => {
                return Err(GenerationError::Malformed(
                    "image had neither inline data nor a URL".to_string(),
                ))
            }
        };

        if bytes.is_empty() {
            return Err(GenerationError::EmptyBody);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    use crate::application::ports::outbound::ChatMessage;
    use crate::infrastructure::test_support::spawn_server;

    fn config(base_url: &str) -> GenerationConfig {
        GenerationConfig {
            enabled: true,
            base_url: base_url.to_string(),
            api_key: Some("sk-test".to_string()),
            caption_model: "caption-model".to_string(),
            image_model: "image-model".to_string(),
            image_size: "256x256".to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_caption_completion() {
        let app = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "caption-model");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["max_tokens"], 80);
                Json(json!({
                    "model": "caption-model",
                    "choices": [{ "message": { "role": "assistant", "content": "A fox on a hill." } }],
                    "usage": { "total_tokens": 42 }
                }))
            }),
        );
        let base = spawn_server(app).await;
        let client = OpenAIClient::new(&config(&base), "sk-test").unwrap();

        let request = LlmRequest::new(vec![ChatMessage::user("describe")])
            .with_system_prompt("art director")
            .with_max_tokens(80);
        let response = client.generate(request).await.unwrap();
        assert_eq!(response.content, "A fox on a hill.");
        assert_eq!(response.model, "caption-model");
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_failure() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": { "message": "Incorrect API key provided" } })),
                )
            }),
        );
        let base = spawn_server(app).await;
        let client = OpenAIClient::new(&config(&base), "sk-bad").unwrap();

        let err = client
            .generate(LlmRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Api { status: 401, .. }));
        assert!(err.is_auth_failure());
        assert!(err.to_string().contains("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn test_inline_image_payload() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3, 4]);
        let app = Router::new().route(
            "/images/generations",
            post(move |Json(body): Json<Value>| {
                let encoded = encoded.clone();
                async move {
                    assert_eq!(body["prompt"], "a fox");
                    assert_eq!(body["n"], 1);
                    assert!(body.get("response_format").is_none());
                    Json(json!({ "data": [{ "b64_json": encoded }] }))
                }
            }),
        );
        let base = spawn_server(app).await;
        let client = OpenAIClient::new(&config(&base), "sk-test").unwrap();

        let bytes = client.synthesize_image("a fox").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_hosted_image_is_downloaded() {
        let app = Router::new().route("/files/fox.png", get(|| async { vec![9u8, 8, 7] }));
        let base = spawn_server(app).await;

        let download_url = format!("{}/files/fox.png", base);
        let images = Router::new().route(
            "/images/generations",
            post(move || {
                let download_url = download_url.clone();
                async move { Json(json!({ "data": [{ "url": download_url }] })) }
            }),
        );
        let images_base = spawn_server(images).await;
        let client = OpenAIClient::new(&config(&images_base), "sk-test").unwrap();

        let bytes = client.synthesize_image("a fox").await.unwrap();
        assert_eq!(bytes, vec![9, 8, 7]);
    }

    #[tokio::test]
    async fn test_hosted_delivery_requests_url_and_downloads() {
        let app = Router::new().route("/files/owl.png", get(|| async { vec![4u8, 5, 6] }));
        let base = spawn_server(app).await;

        let download_url = format!("{}/files/owl.png", base);
        let images = Router::new().route(
            "/images/generations",
            post(move |Json(body): Json<Value>| {
                let download_url = download_url.clone();
                async move {
                    if body["response_format"] != "url" {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({ "error": { "message": "expected url delivery" } })),
                        );
                    }
                    (StatusCode::OK, Json(json!({ "data": [{ "url": download_url }] })))
                }
            }),
        );
        let images_base = spawn_server(images).await;
        let client = OpenAIClient::new(&config(&images_base), "sk-test")
            .unwrap()
            .with_delivery(ImageDelivery::Hosted);

        assert_eq!(client.provider_name(), "openai-images-hosted");
        let bytes = client.synthesize_image("an owl").await.unwrap();
        assert_eq!(bytes, vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn test_empty_download_is_failure() {
        let app = Router::new().route("/empty.png", get(|| async { Vec::<u8>::new() }));
        let base = spawn_server(app).await;

        let download_url = format!("{}/empty.png", base);
        let images = Router::new().route(
            "/images/generations",
            post(move || {
                let download_url = download_url.clone();
                async move { Json(json!({ "data": [{ "url": download_url }] })) }
            }),
        );
        let images_base = spawn_server(images).await;
        let client = OpenAIClient::new(&config(&images_base), "sk-test").unwrap();

        let err = client.synthesize_image("a fox").await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyBody));
    }

    #[tokio::test]
    async fn test_no_images_is_malformed() {
        let app = Router::new().route(
            "/images/generations",
            post(|| async { Json(json!({ "data": [] })) }),
        );
        let base = spawn_server(app).await;
        let client = OpenAIClient::new(&config(&base), "sk-test").unwrap();

        let err = client.synthesize_image("a fox").await.unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client = OpenAIClient::new(&config("http://127.0.0.1:9"), "sk-test").unwrap();
        let err = client.synthesize_image("a fox").await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
        assert!(!err.is_auth_failure());
    }
}
