//! Apimart wire types and the normalization boundary.
//!
//! The vendor wraps every response in an envelope `{"code", "message",
//! "data"}` and has shipped two shapes for task results: a nested
//! `result.images[0].url[0]` and a flat `results[0].url`. All accepted
//! shapes are mapped into one canonical [`TaskSnapshot`] by
//! [`normalize_status`]; no code past this module branches on response
//! shape.

use serde::Deserialize;

use pictor_core::task::{ReportedStatus, TaskSnapshot};

/// Envelope `code` value indicating vendor-side success.
pub const VENDOR_OK: i64 = 200;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The outer `{code, message?, data?}` wrapper on every Apimart response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// One element of the `data` array returned by `POST /v1/images/generations`.
#[derive(Debug, Deserialize)]
pub struct SubmitData {
    pub task_id: String,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// The `data` object returned by `GET /v1/tasks/{task_id}`.
///
/// Every field is optional: the vendor omits `progress` early in a task's
/// life, `result` until (and occasionally after) completion, and `error`
/// unless the task failed.
#[derive(Debug, Default, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub result: Option<ResultBlock>,
    #[serde(default)]
    pub results: Option<Vec<AltResult>>,
    #[serde(default)]
    pub error: Option<VendorError>,
}

/// Nested result shape: `result.images[*].url[*]`.
#[derive(Debug, Deserialize)]
pub struct ResultBlock {
    #[serde(default)]
    pub images: Vec<ResultImage>,
}

/// One generated image in the nested shape. `url` is a list because the
/// vendor returns mirrors of the same image.
#[derive(Debug, Deserialize)]
pub struct ResultImage {
    #[serde(default)]
    pub url: Vec<String>,
}

/// Flat result shape used by an alternate endpoint version: `results[*].url`.
#[derive(Debug, Deserialize)]
pub struct AltResult {
    #[serde(default)]
    pub url: Option<String>,
}

/// Vendor error block. The numeric/string `code` field is ignored; only
/// the message reaches the caller.
#[derive(Debug, Deserialize)]
pub struct VendorError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Map a raw status payload into the canonical [`TaskSnapshot`].
///
/// - The image URL is resolved across both result shapes, nested first.
///   Empty strings do not count as resolvable.
/// - The status string is reduced via [`ReportedStatus::parse`].
/// - Progress is floored into `0..=100`; absent stays absent (the state
///   machine treats it as 0).
pub fn normalize_status(payload: &StatusPayload) -> TaskSnapshot {
    TaskSnapshot {
        reported_status: ReportedStatus::parse(payload.status.as_deref()),
        progress: payload
            .progress
            .map(|p| p.clamp(0.0, 100.0).floor() as u8),
        image_url: resolve_image_url(payload),
        error_message: payload
            .error
            .as_ref()
            .and_then(|e| e.message.clone()),
    }
}

/// First resolvable image URL across the two accepted result shapes.
fn resolve_image_url(payload: &StatusPayload) -> Option<String> {
    let nested = payload
        .result
        .as_ref()
        .and_then(|r| r.images.first())
        .and_then(|img| img.url.first())
        .cloned();
    let flat = payload
        .results
        .as_ref()
        .and_then(|r| r.first())
        .and_then(|entry| entry.url.clone());

    nested.or(flat).filter(|url| !url.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
