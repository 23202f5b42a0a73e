//! Generation request types, limits, and validation.
//!
//! A [`GenerationRequest`] is immutable once submitted; validation runs
//! before submission so a rejected request never reaches the vendor.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum length of a prompt in characters.
pub const MAX_PROMPT_LEN: usize = 4000;

/// Minimum number of images per request.
pub const MIN_IMAGE_COUNT: u8 = 1;

/// Maximum number of images per request.
pub const MAX_IMAGE_COUNT: u8 = 4;

/// Maximum number of reference image URLs per request.
pub const MAX_REFERENCE_IMAGES: usize = 5;

// ---------------------------------------------------------------------------
// Size / resolution enums
// ---------------------------------------------------------------------------

/// Aspect-ratio descriptor sent to the vendor as its wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    ClassicPortrait,
}

impl ImageSize {
    /// The exact string the vendor expects in the `size` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Classic => "4:3",
            Self::ClassicPortrait => "3:4",
        }
    }
}

/// Resolution tier, one of the vendor's enumerated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionTier {
    #[serde(rename = "1k")]
    OneK,
    #[serde(rename = "2k")]
    TwoK,
    #[serde(rename = "4k")]
    FourK,
}

impl ResolutionTier {
    /// The exact string the vendor expects in the `resolution` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneK => "1k",
            Self::TwoK => "2k",
            Self::FourK => "4k",
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One image-generation request. Immutable once submitted.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// Vendor model identifier.
    pub model: String,
    /// Text prompt.
    pub prompt: String,
    /// Aspect-ratio descriptor.
    pub size: ImageSize,
    /// Resolution tier.
    pub resolution: ResolutionTier,
    /// Number of images to generate.
    pub n: u8,
    /// Ordered reference image URLs, if any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
}

impl GenerationRequest {
    /// Convenience constructor with the common defaults (one square 1k image,
    /// no references).
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            size: ImageSize::Square,
            resolution: ResolutionTier::OneK,
            n: 1,
            image_urls: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a prompt: non-empty (after trimming) and within the length cap.
pub fn validate_prompt(prompt: &str) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation(
            "Prompt must not be empty".to_string(),
        ));
    }
    if prompt.chars().count() > MAX_PROMPT_LEN {
        return Err(CoreError::Validation(format!(
            "Prompt too long: {} chars (max {MAX_PROMPT_LEN})",
            prompt.chars().count()
        )));
    }
    Ok(())
}

/// Validate the requested image count is within the vendor's range.
pub fn validate_image_count(n: u8) -> Result<(), CoreError> {
    if !(MIN_IMAGE_COUNT..=MAX_IMAGE_COUNT).contains(&n) {
        return Err(CoreError::Validation(format!(
            "Image count must be between {MIN_IMAGE_COUNT} and {MAX_IMAGE_COUNT}, got {n}"
        )));
    }
    Ok(())
}

/// Validate a full request before submission.
pub fn validate_request(request: &GenerationRequest) -> Result<(), CoreError> {
    validate_prompt(&request.prompt)?;
    validate_image_count(request.n)?;
    if request.model.is_empty() {
        return Err(CoreError::Validation(
            "Model must not be empty".to_string(),
        ));
    }
    if request.image_urls.len() > MAX_REFERENCE_IMAGES {
        return Err(CoreError::Validation(format!(
            "Too many reference images: {} (max {MAX_REFERENCE_IMAGES})",
            request.image_urls.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
