//! Artifact routes under `/images`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use super::AppState;
use crate::domain::artifact::encode_image;
use crate::error::{Result, StudioError};

#[derive(Debug, Deserialize)]
pub(crate) struct PromptBody {
    #[serde(default)]
    prompt: String,
}

/// Text and file parts of a multipart upload, keyed by field name.
#[derive(Default)]
struct UploadForm {
    prompt: Option<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| StudioError::ValidationError(format!("invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "prompt" {
                form.prompt = Some(field.text().await.map_err(|e| {
                    StudioError::ValidationError(format!("invalid prompt field: {}", e))
                })?);
            } else {
                let bytes = field.bytes().await.map_err(|e| {
                    StudioError::ValidationError(format!("invalid {} field: {}", name, e))
                })?;
                form.files.push((name, bytes.to_vec()));
            }
        }
        Ok(form)
    }

    fn file(&self, name: &str) -> Result<&[u8]> {
        self.files
            .iter()
            .find(|(field, bytes)| field == name && !bytes.is_empty())
            .map(|(_, bytes)| bytes.as_slice())
            .ok_or_else(|| StudioError::ValidationError(format!("{} file is required", name)))
    }
}

/// POST /images/generate
pub(crate) async fn handle_generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PromptBody>,
) -> Result<impl IntoResponse> {
    let artifact = state.pipeline.generate_from_prompt(&body.prompt).await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// POST /images/sketch
pub(crate) async fn handle_sketch(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = UploadForm::read(multipart).await?;
    let prompt = form.prompt.clone().unwrap_or_default();
    let artifact = state
        .pipeline
        .generate_from_sketch(&prompt, form.file("sketch")?)
        .await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// POST /images/preview-first
pub(crate) async fn handle_preview_first(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PromptBody>,
) -> Result<impl IntoResponse> {
    let artifact = state.pipeline.generate_preview_first(&body.prompt).await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// POST /images/{id}/extract-stamp
pub(crate) async fn handle_extract_stamp(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let artifact = state.pipeline.extract_stamp_from_preview(&id).await?;
    Ok(Json(artifact))
}

/// POST /images/remove-background
pub(crate) async fn handle_remove_background(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = UploadForm::read(multipart).await?;
    let artifact = state
        .pipeline
        .remove_background_and_store(form.file("image")?)
        .await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// POST /images/upscale
pub(crate) async fn handle_upscale(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = UploadForm::read(multipart).await?;
    let upscaled = state.pipeline.upscale(form.file("image")?).await?;
    Ok(Json(serde_json::json!({ "result": encode_image(&upscaled) })))
}

/// GET /images
pub(crate) async fn handle_list(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog.list().await?))
}

/// GET /images/{id}
pub(crate) async fn handle_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog.get(&id).await?))
}

/// DELETE /images/{id}
pub(crate) async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.catalog.delete(&id).await?;
    Ok(Json(
        serde_json::json!({ "message": "Image deleted successfully" }),
    ))
}

/// DELETE /images
pub(crate) async fn handle_delete_all(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse> {
    let deleted = state.catalog.delete_all().await?;
    Ok(Json(serde_json::json!({
        "message": "All images deleted successfully",
        "deleted": deleted,
    })))
}
