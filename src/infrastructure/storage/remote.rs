//! Supabase-style object storage backend

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::filename::sanitize_filename;
use crate::application::ports::outbound::{ArtifactStorePort, StorageError};
use crate::domain::entities::{RetrievalReference, StoredArtifact};
use crate::infrastructure::config::ObjectStorageConfig;

/// Uploads storybooks to a bucket and mints time-limited download URLs
pub struct RemoteObjectStore {
    client: Client,
    base_url: String,
    api_key: String,
    bucket: String,
    key_prefix: String,
    signed_url_ttl_secs: u64,
}

impl RemoteObjectStore {
    pub fn new(config: &ObjectStorageConfig, timeout: Duration) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            bucket: config.bucket.trim_matches('/').to_string(),
            key_prefix: config.key_prefix.trim_matches('/').to_string(),
            signed_url_ttl_secs: config.signed_url_ttl_secs.max(1),
        })
    }

    /// Object key inside the bucket
    fn object_key(&self, filename: &str) -> String {
        if self.key_prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", self.key_prefix, filename)
        }
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let response = self
            .client
            .post(format!("{}/object/{}/{}", self.base_url, self.bucket, key))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header("x-upsert", "false")
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes)
            .send()
            .await
            .map_err(request_error)?;

        ensure_success(response).await.map(|_| ())
    }

    async fn sign(&self, key: &str) -> Result<String, StorageError> {
        let response = self
            .client
            .post(format!("{}/object/sign/{}/{}", self.base_url, self.bucket, key))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(&SignRequest {
                expires_in: self.signed_url_ttl_secs,
            })
            .send()
            .await
            .map_err(request_error)?;

        let signed: SignResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Malformed(e.to_string()))?;

        Ok(self.resolve(&signed.signed_url))
    }

    /// Signed paths come back relative to the storage API root
    fn resolve(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else if signed.starts_with('/') {
            format!("{}{}", self.base_url, signed)
        } else {
            format!("{}/{}", self.base_url, signed)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    error: Option<String>,
}

fn request_error(e: reqwest::Error) -> StorageError {
    StorageError::Request(e.to_string())
}

async fn ensure_success(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .unwrap_or(text);
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ArtifactStorePort for RemoteObjectStore {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    async fn store(
        &self,
        bytes: Vec<u8>,
        suggested_filename: &str,
    ) -> Result<StoredArtifact, StorageError> {
        let filename = sanitize_filename(suggested_filename);
        let key = self.object_key(&filename);
        let size_bytes = bytes.len();

        self.upload(&key, bytes).await?;
        debug!(bucket = %self.bucket, key = %key, "Uploaded storybook");

        let url = self.sign(&key).await?;
        let expires_at = Utc::now() + chrono::Duration::seconds(self.signed_url_ttl_secs as i64);

        Ok(StoredArtifact {
            filename,
            reference: RetrievalReference::SignedUrl { url, expires_at },
            size_bytes,
        })
    }

    async fn retrieve(&self, filename: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let key = self.object_key(&sanitize_filename(filename));
        let response = self
            .client
            .get(format!("{}/object/{}/{}", self.base_url, self.bucket, key))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let bytes = ensure_success(response)
            .await?
            .bytes()
            .await
            .map_err(request_error)?;
        Ok(Some(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{
        body::Bytes,
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode as HttpStatus},
        response::{IntoResponse, Response as AxumResponse},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    use crate::infrastructure::test_support::spawn_server;

    const KEY: &str = "service-key";

    type Objects = Arc<Mutex<HashMap<String, Vec<u8>>>>;

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {}", KEY))
    }

    async fn upload(
        State(objects): State<Objects>,
        Path((bucket, key)): Path<(String, String)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> AxumResponse {
        if !authorized(&headers) {
            return (HttpStatus::UNAUTHORIZED, Json(json!({ "message": "Invalid JWT" })))
                .into_response();
        }
        assert_eq!(headers["x-upsert"], "false");
        let path = format!("{}/{}", bucket, key);
        let mut objects = objects.lock().unwrap();
        if objects.contains_key(&path) {
            return (
                HttpStatus::CONFLICT,
                Json(json!({ "error": "Duplicate", "message": "The resource already exists" })),
            )
                .into_response();
        }
        objects.insert(path.clone(), body.to_vec());
        Json(json!({ "Key": path })).into_response()
    }

    async fn download(
        State(objects): State<Objects>,
        Path((bucket, key)): Path<(String, String)>,
    ) -> AxumResponse {
        match objects.lock().unwrap().get(&format!("{}/{}", bucket, key)) {
            Some(bytes) => bytes.clone().into_response(),
            None => HttpStatus::NOT_FOUND.into_response(),
        }
    }

    async fn sign(
        Path((bucket, key)): Path<(String, String)>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        assert_eq!(body["expiresIn"], 600);
        Json(json!({ "signedURL": format!("/object/sign/{}/{}?token=abc", bucket, key) }))
    }

    async fn signed_download(
        State(objects): State<Objects>,
        Path((bucket, key)): Path<(String, String)>,
        Query(query): Query<HashMap<String, String>>,
    ) -> AxumResponse {
        if query.get("token").map(String::as_str) != Some("abc") {
            return HttpStatus::BAD_REQUEST.into_response();
        }
        download(State(objects), Path((bucket, key))).await
    }

    /// Minimal stand-in for the storage REST API
    fn fake_storage(objects: Objects) -> Router {
        Router::new()
            .route(
                "/storage/v1/object/sign/{bucket}/{*key}",
                post(sign).get(signed_download),
            )
            .route(
                "/storage/v1/object/{bucket}/{*key}",
                post(upload).get(download),
            )
            .with_state(objects)
    }

    fn config(base: &str, api_key: &str) -> ObjectStorageConfig {
        ObjectStorageConfig {
            base_url: format!("{}/storage/v1/", base),
            api_key: api_key.to_string(),
            bucket: "books".to_string(),
            key_prefix: "/storybooks/".to_string(),
            signed_url_ttl_secs: 600,
        }
    }

    #[tokio::test]
    async fn test_store_then_fetch_signed_url() {
        let objects = Objects::default();
        let base = spawn_server(fake_storage(objects.clone())).await;
        let store = RemoteObjectStore::new(&config(&base, KEY), Duration::from_secs(5)).unwrap();

        let before = Utc::now();
        let artifact = store
            .store(b"%PDF-1.5 remote".to_vec(), "pip's tale.pdf")
            .await
            .unwrap();
        assert_eq!(artifact.filename, "pip_s_tale.pdf");
        assert!(objects
            .lock()
            .unwrap()
            .contains_key("books/storybooks/pip_s_tale.pdf"));

        let RetrievalReference::SignedUrl { url, expires_at } = artifact.reference else {
            panic!("expected a signed URL");
        };
        assert_eq!(
            url,
            format!(
                "{}/storage/v1/object/sign/books/storybooks/pip_s_tale.pdf?token=abc",
                base
            )
        );
        assert!(expires_at >= before + chrono::Duration::seconds(600));

        let fetched = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
        assert_eq!(&fetched[..], b"%PDF-1.5 remote");

        let retrieved = store.retrieve("pip_s_tale.pdf").await.unwrap();
        assert_eq!(retrieved.as_deref(), Some(&b"%PDF-1.5 remote"[..]));
        assert!(store.retrieve("missing.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_upload_is_rejected() {
        let base = spawn_server(fake_storage(Objects::default())).await;
        let store = RemoteObjectStore::new(&config(&base, KEY), Duration::from_secs(5)).unwrap();

        store.store(vec![1], "same.pdf").await.unwrap();
        let err = store.store(vec![2], "same.pdf").await.unwrap_err();
        match err {
            StorageError::Api { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "The resource already exists");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_key_surfaces_status() {
        let base = spawn_server(fake_storage(Objects::default())).await;
        let store =
            RemoteObjectStore::new(&config(&base, "wrong"), Duration::from_secs(5)).unwrap();

        let err = store.store(vec![1], "a.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::Api { status: 401, .. }));
    }

    #[test]
    fn test_resolve_signed_paths() {
        let store = RemoteObjectStore::new(
            &config("https://x.example.co", KEY),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            store.resolve("/object/sign/b/k?token=t"),
            "https://x.example.co/storage/v1/object/sign/b/k?token=t"
        );
        assert_eq!(
            store.resolve("https://cdn.example.co/k"),
            "https://cdn.example.co/k"
        );
    }
}
