//! Storybook API routes

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::application::services::{StorybookError, StorybookOutcome, StorybookRequest};
use crate::infrastructure::state::AppState;
use crate::infrastructure::storage::sanitize_filename;

const GENERIC_HINT: &str = "Storybooks can still be built with remote generation turned off \
     (STORYBOOK_GENERATION_ENABLED=false); illustrations then use placeholder artwork.";
const CREDENTIAL_HINT: &str = "A credential is missing or invalid. Check OPENAI_API_KEY and \
     STORAGE_API_KEY, or set STORYBOOK_GENERATION_ENABLED=false to build with placeholder artwork.";

/// Request to build a storybook from narrative text
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStorybookRequest {
    #[serde(default)]
    pub narrative_text: Option<String>,
    #[serde(default)]
    pub protagonist_name: Option<String>,
    #[serde(default)]
    pub setting_name: Option<String>,
    #[serde(default)]
    pub mission_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub section_count: Option<usize>,
}

impl From<CreateStorybookRequest> for StorybookRequest {
    fn from(req: CreateStorybookRequest) -> Self {
        Self {
            narrative: req.narrative_text.unwrap_or_default(),
            title: req.title,
            protagonist: req.protagonist_name,
            setting: req.setting_name,
            mission: req.mission_name,
            section_count: req.section_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IllustrationCounts {
    pub generated: usize,
    pub placeholder: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorybookResponse {
    pub build_id: String,
    pub retrieval_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub filename: String,
    pub size_bytes: usize,
    pub page_count: usize,
    pub section_count: usize,
    pub illustrations: IllustrationCounts,
}

impl From<StorybookOutcome> for StorybookResponse {
    fn from(outcome: StorybookOutcome) -> Self {
        Self {
            build_id: outcome.build_id.to_string(),
            retrieval_reference: outcome.artifact.reference.as_str().to_string(),
            expires_at: outcome
                .artifact
                .reference
                .expires_at()
                .map(|t| t.to_rfc3339()),
            filename: outcome.artifact.filename,
            size_bytes: outcome.artifact.size_bytes,
            page_count: outcome.page_count,
            section_count: outcome.section_count,
            illustrations: IllustrationCounts {
                generated: outcome.generated_illustrations,
                placeholder: outcome.placeholder_illustrations,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            hint: None,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn storybook_error(err: StorybookError) -> ApiError {
    match err {
        StorybookError::InvalidRequest(message) => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
        }
        err if err.is_credential_error() => {
            error!("Storybook build failed on credentials: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Storybook could not be created".to_string(),
                    code: Some("credential_error"),
                    hint: Some(CREDENTIAL_HINT),
                }),
            )
        }
        err => {
            error!("Storybook build failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Storybook could not be created".to_string(),
                    code: Some("storybook_failed"),
                    hint: Some(GENERIC_HINT),
                }),
            )
        }
    }
}

/// Build, assemble and store a storybook
pub async fn create_storybook(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateStorybookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StorybookResponse>), ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(rejection.body_text())),
        )
    })?;

    let outcome = state
        .storybook_service
        .create_storybook(req.into())
        .await
        .map_err(storybook_error)?;

    Ok((StatusCode::CREATED, Json(StorybookResponse::from(outcome))))
}

/// Download a storybook kept by the local backend
pub async fn get_storybook_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let filename = sanitize_filename(&filename);

    let bytes = state
        .storybook_service
        .store()
        .retrieve(&filename)
        .await
        .map_err(|e| {
            error!(filename = %filename, "Failed to read storybook: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to read storybook")),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Storybook not found")),
            )
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    ))
}
