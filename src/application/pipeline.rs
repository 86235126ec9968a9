use crate::config::Assets;
use crate::domain::artifact::{Artifact, NewArtifact, decode_image, encode_image};
use crate::domain::generation::{Erase, Inpaint, SketchToImage, TextToImage};
use crate::domain::ports::{SharedArtifactStore, SharedImageProvider};
use crate::error::{Result, StudioError};
use std::sync::Arc;
use tracing::info;

/// Style prefix prepended to every user prompt of the prompt-first pipeline.
pub const STAMP_STYLE_PREFIX: &str = "A minimalist and elegant design featuring a simple yet \
beautiful central element on a plain white background. The design is suitable for printing on \
a t-shirt, with limited colors, clean lines, and no distracting elements. The central element \
should be visually striking but not overly complex, using soft, harmonious colors that stand \
out against the white background. ";

pub const PLACEMENT_PROMPT: &str = "Place the stamp image conservatively on the center of a \
plain white t-shirt. The t-shirt should be worn by a person, and the stamp image should be \
clearly visible but not overly large.";

pub const PLACEMENT_NEGATIVE_PROMPT: &str = "blurry stamp, distorted stamp, large stamp, \
off-center stamp, stamp on sleeves, stamp on edges, stamp on neck, partially visible stamp, \
rotated stamp, stamp with shadows, altered stamp, deformed t-shirt, overly complex background, \
abstract patterns on t-shirt, distorted t-shirt shape, t-shirt wrinkles";

pub const SKETCH_CONTROL_STRENGTH: f32 = 0.6;

/// Builds the provider prompt for a stamp from the user's text.
pub fn stamp_prompt(prompt: &str) -> String {
    format!("{}{}", STAMP_STYLE_PREFIX, prompt.trim())
}

fn require_prompt(prompt: &str) -> Result<&str> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(StudioError::ValidationError("Prompt is required".to_string()));
    }
    Ok(prompt)
}

fn require_image<'a>(label: &str, image: &'a [u8]) -> Result<&'a [u8]> {
    if image.is_empty() {
        return Err(StudioError::ValidationError(format!("{} is required", label)));
    }
    Ok(image)
}

/// Sequences provider calls into artifacts.
///
/// Nothing is persisted until every provider call of an operation has
/// succeeded, so a failed pipeline never leaves a half-built artifact behind.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    store: SharedArtifactStore,
    provider: SharedImageProvider,
    assets: Arc<Assets>,
    seed: u64,
}

impl PipelineOrchestrator {
    pub fn new(
        store: SharedArtifactStore,
        provider: SharedImageProvider,
        assets: Arc<Assets>,
        seed: u64,
    ) -> Self {
        Self {
            store,
            provider,
            assets,
            seed,
        }
    }

    /// Prompt-first pipeline: generate the stamp, then place it on the garment.
    pub async fn generate_from_prompt(&self, prompt: &str) -> Result<Artifact> {
        let prompt = require_prompt(prompt)?;
        info!(pipeline = "prompt", "generating stamp");

        let stamp = self
            .provider
            .text_to_image(TextToImage {
                prompt: stamp_prompt(prompt),
                seed: self.seed,
            })
            .await?;
        let preview = self.compose_preview(&stamp).await?;

        self.persist(prompt, Some(&stamp), &preview).await
    }

    /// Sketch-first pipeline: condition the stamp on a sketch, then place it.
    pub async fn generate_from_sketch(&self, prompt: &str, sketch: &[u8]) -> Result<Artifact> {
        let prompt = require_prompt(prompt)?;
        let sketch = require_image("Sketch", sketch)?;
        info!(pipeline = "sketch", sketch_bytes = sketch.len(), "generating stamp");

        let stamp = self
            .provider
            .sketch_to_image(SketchToImage {
                prompt: prompt.to_string(),
                sketch: sketch.to_vec(),
                control_strength: SKETCH_CONTROL_STRENGTH,
                seed: self.seed,
            })
            .await?;
        let preview = self.compose_preview(&stamp).await?;

        self.persist(prompt, Some(&stamp), &preview).await
    }

    /// Places a stamp on the garment mockup. Persists nothing.
    pub async fn compose_preview(&self, stamp: &[u8]) -> Result<Vec<u8>> {
        let stamp = require_image("Stamp", stamp)?;
        self.provider
            .inpaint(Inpaint {
                image: self.assets.garment_image.clone(),
                mask: self.assets.garment_mask.clone(),
                style_image: Some(stamp.to_vec()),
                prompt: PLACEMENT_PROMPT.to_string(),
                negative_prompt: Some(PLACEMENT_NEGATIVE_PROMPT.to_string()),
                seed: self.seed,
            })
            .await
    }

    /// Preview-first pipeline: paint the design straight onto the garment.
    ///
    /// The resulting artifact has no stamp until
    /// [`extract_stamp_from_preview`](Self::extract_stamp_from_preview) runs.
    pub async fn generate_preview_first(&self, prompt: &str) -> Result<Artifact> {
        let prompt = require_prompt(prompt)?;
        info!(pipeline = "preview-first", "generating preview");

        let preview = self
            .provider
            .inpaint(Inpaint {
                image: self.assets.garment_image.clone(),
                mask: self.assets.garment_mask.clone(),
                style_image: None,
                prompt: prompt.to_string(),
                negative_prompt: Some(PLACEMENT_NEGATIVE_PROMPT.to_string()),
                seed: self.seed,
            })
            .await?;

        self.persist(prompt, None, &preview).await
    }

    /// Recovers a printable stamp from a preview-first artifact.
    pub async fn extract_stamp_from_preview(&self, id: &str) -> Result<Artifact> {
        let artifact = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| StudioError::not_found(id))?;
        let preview = artifact
            .preview_img
            .as_deref()
            .ok_or_else(|| StudioError::NotFound(format!("{} has no preview image", id)))?;
        let preview = decode_image(preview)?;

        let erased = self
            .provider
            .erase(Erase {
                image: preview,
                mask: self.assets.inverted_mask.clone(),
                seed: self.seed,
            })
            .await?;
        let stamp = self.provider.remove_background(erased).await?;

        let encoded = encode_image(&stamp);
        let artifact = self
            .store
            .modify(
                id,
                Box::new(move |artifact| {
                    artifact.stamp_img = Some(encoded);
                    Ok(())
                }),
            )
            .await?;

        info!(artifact_id = %id, stamp_bytes = stamp.len(), "stamp extracted from preview");
        Ok(artifact)
    }

    /// Background removal that records its output as a standalone artifact.
    pub async fn remove_background_and_store(&self, image: &[u8]) -> Result<Artifact> {
        let cleaned = self.remove_background(image).await?;
        let artifact = self
            .store
            .create(NewArtifact {
                removed_background_img: Some(encode_image(&cleaned)),
                ..NewArtifact::default()
            })
            .await?;
        info!(artifact_id = %artifact.id, "background removed");
        Ok(artifact)
    }

    pub async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>> {
        let image = require_image("Image", image)?;
        self.provider.remove_background(image.to_vec()).await
    }

    pub async fn upscale(&self, image: &[u8]) -> Result<Vec<u8>> {
        let image = require_image("Image", image)?;
        self.provider.upscale(image.to_vec()).await
    }

    async fn persist(&self, prompt: &str, stamp: Option<&[u8]>, preview: &[u8]) -> Result<Artifact> {
        let artifact = self
            .store
            .create(NewArtifact {
                prompt: Some(prompt.to_string()),
                stamp_img: stamp.map(encode_image),
                preview_img: Some(encode_image(preview)),
                removed_background_img: None,
            })
            .await?;
        info!(
            artifact_id = %artifact.id,
            has_stamp = artifact.stamp_img.is_some(),
            "artifact persisted"
        );
        Ok(artifact)
    }
}
