use super::multipart::MultipartForm;
use crate::domain::generation::{Erase, Inpaint, SketchToImage, TextToImage};
use crate::domain::ports::ImageProvider;
use crate::error::{Result, StudioError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const GENERATE_CORE: &str = "v2beta/stable-image/generate/core";
const CONTROL_SKETCH: &str = "v2beta/stable-image/control/sketch";
const EDIT_INPAINT: &str = "v2beta/stable-image/edit/inpaint";
const EDIT_ERASE: &str = "v2beta/stable-image/edit/erase";
const EDIT_REMOVE_BACKGROUND: &str = "v2beta/stable-image/edit/remove-background";
const UPSCALE_FAST: &str = "v2beta/stable-image/upscale/fast";

const OUTPUT_FORMAT: &str = "webp";
const IMAGE_MIME: &str = "image/webp";

/// Largest image body accepted from the provider: 50 MB.
const MAX_IMAGE_BYTES: u64 = 50 * 1024 * 1024;

/// Error body returned by the provider on non-success responses.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Converts a non-success provider response into a `ProviderError`.
///
/// Bodies that are not the provider's JSON error shape are kept verbatim as
/// the only detail.
fn provider_error(status: u16, body: &[u8]) -> StudioError {
    match serde_json::from_slice::<ProviderErrorBody>(body) {
        Ok(parsed) => {
            let mut details = parsed.errors;
            if let Some(message) = parsed.message {
                details.push(message);
            }
            StudioError::ProviderError {
                status,
                name: parsed.name.unwrap_or_else(|| "unknown_error".to_string()),
                details,
            }
        }
        Err(_) => StudioError::ProviderError {
            status,
            name: "unknown_error".to_string(),
            details: vec![String::from_utf8_lossy(body).into_owned()],
        },
    }
}

fn unavailable(err: ureq::Error) -> StudioError {
    StudioError::Unavailable {
        service: "image provider",
        message: err.to_string(),
    }
}

/// A response that arrived but could not be read in full.
///
/// An oversized body is the provider's answer, not an outage.
fn read_failure(status: u16, err: ureq::Error) -> StudioError {
    match err {
        ureq::Error::BodyExceedsLimit(limit) => StudioError::ProviderError {
            status,
            name: "response_too_large".to_string(),
            details: vec![format!("response body exceeds {} bytes", limit)],
        },
        other => unavailable(other),
    }
}

/// Client for the Stability image API.
///
/// Every call is a blocking `ureq` request run on the blocking pool, bounded
/// by the agent's global timeout.
#[derive(Clone)]
pub struct StabilityClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl StabilityClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn post_form(&self, endpoint: &'static str, form: MultipartForm) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        let authorization = format!("Bearer {}", self.api_key);
        let agent = self.agent.clone();
        let (content_type, body) = form.finish();

        debug!(endpoint, request_bytes = body.len(), "provider request");
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            let mut response = agent
                .post(&url)
                .header("Authorization", &authorization)
                .header("Accept", "image/*")
                .header("Content-Type", &content_type)
                .send(&body[..])
                .map_err(unavailable)?;

            let status = response.status().as_u16();
            let bytes = response
                .body_mut()
                .with_config()
                .limit(MAX_IMAGE_BYTES)
                .read_to_vec()
                .map_err(|e| read_failure(status, e))?;

            if (200..300).contains(&status) {
                Ok(bytes)
            } else {
                Err(provider_error(status, &bytes))
            }
        })
        .await?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(bytes) => debug!(
                endpoint,
                elapsed_ms,
                response_bytes = bytes.len(),
                "provider response"
            ),
            Err(e) => warn!(endpoint, elapsed_ms, error = %e, "provider call failed"),
        }
        result
    }
}

#[async_trait]
impl ImageProvider for StabilityClient {
    async fn text_to_image(&self, request: TextToImage) -> Result<Vec<u8>> {
        let form = MultipartForm::new()
            .text("prompt", &request.prompt)
            .text("seed", request.seed.to_string())
            .text("output_format", OUTPUT_FORMAT);
        self.post_form(GENERATE_CORE, form).await
    }

    async fn sketch_to_image(&self, request: SketchToImage) -> Result<Vec<u8>> {
        let form = MultipartForm::new()
            .file("image", "sketch.webp", IMAGE_MIME, &request.sketch)
            .text("prompt", &request.prompt)
            .text("control_strength", request.control_strength.to_string())
            .text("seed", request.seed.to_string())
            .text("output_format", OUTPUT_FORMAT);
        self.post_form(CONTROL_SKETCH, form).await
    }

    async fn inpaint(&self, request: Inpaint) -> Result<Vec<u8>> {
        let mut form = MultipartForm::new()
            .file("image", "image.webp", IMAGE_MIME, &request.image)
            .file("mask", "mask.webp", IMAGE_MIME, &request.mask);
        if let Some(style) = &request.style_image {
            form = form.file("style_image", "stamp.webp", IMAGE_MIME, style);
        }
        form = form.text("prompt", &request.prompt);
        if let Some(negative) = &request.negative_prompt {
            form = form.text("negative_prompt", negative);
        }
        let form = form
            .text("seed", request.seed.to_string())
            .text("output_format", OUTPUT_FORMAT);
        self.post_form(EDIT_INPAINT, form).await
    }

    async fn erase(&self, request: Erase) -> Result<Vec<u8>> {
        let form = MultipartForm::new()
            .file("image", "image.webp", IMAGE_MIME, &request.image)
            .file("mask", "mask.webp", IMAGE_MIME, &request.mask)
            .text("seed", request.seed.to_string())
            .text("output_format", OUTPUT_FORMAT);
        self.post_form(EDIT_ERASE, form).await
    }

    async fn remove_background(&self, image: Vec<u8>) -> Result<Vec<u8>> {
        let form = MultipartForm::new()
            .file("image", "image.webp", IMAGE_MIME, &image)
            .text("output_format", OUTPUT_FORMAT);
        self.post_form(EDIT_REMOVE_BACKGROUND, form).await
    }

    async fn upscale(&self, image: Vec<u8>) -> Result<Vec<u8>> {
        let form = MultipartForm::new()
            .file("image", "image.webp", IMAGE_MIME, &image)
            .text("output_format", OUTPUT_FORMAT);
        self.post_form(UPSCALE_FAST, form).await
    }
}
