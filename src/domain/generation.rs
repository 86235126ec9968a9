//! Inputs to the generative image provider.
//!
//! Each request carries everything the provider needs to reproduce the same
//! output: the seed is explicit and never chosen by the provider.

/// Text-to-image generation of a stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TextToImage {
    pub prompt: String,
    pub seed: u64,
}

/// Sketch-conditioned generation of a stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct SketchToImage {
    pub prompt: String,
    pub sketch: Vec<u8>,
    pub control_strength: f32,
    pub seed: u64,
}

/// Mask-guided inpaint of `image`.
///
/// `style_image`, when present, is the design the provider should place into
/// the masked region.
#[derive(Debug, Clone, PartialEq)]
pub struct Inpaint {
    pub image: Vec<u8>,
    pub mask: Vec<u8>,
    pub style_image: Option<Vec<u8>>,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub seed: u64,
}

/// Erases the masked region of `image`.
#[derive(Debug, Clone, PartialEq)]
pub struct Erase {
    pub image: Vec<u8>,
    pub mask: Vec<u8>,
    pub seed: u64,
}
