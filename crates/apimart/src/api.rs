//! REST client for the Apimart HTTP endpoints.
//!
//! Wraps submission, task status, and preset listing using [`reqwest`].
//! Status responses leave this module already normalized into
//! [`TaskSnapshot`]s (see [`crate::wire`]).

use serde::Deserialize;

use pictor_core::error::CoreError;
use pictor_core::generation::{validate_request, GenerationRequest};
use pictor_core::task::TaskSnapshot;
use pictor_core::types::TaskId;

use crate::wire::{normalize_status, Envelope, StatusPayload, SubmitData, VENDOR_OK};

/// Fallback shown when the vendor rejects a request without a message.
pub const GENERIC_SUBMIT_ERROR: &str = "Image generation request failed";

/// HTTP client for one Apimart account.
pub struct ApimartApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// One browsable generation preset, as listed by `GET /v1/presets`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Errors from the Apimart REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApimartApiError {
    /// The request was rejected client-side before submission.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The vendor returned a non-2xx HTTP status.
    #[error("Apimart API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The vendor answered 2xx but the envelope signalled rejection
    /// (non-200 `code`, or a missing/empty `data` field).
    #[error("Vendor rejected request: {message}")]
    Vendor { message: String },
}

impl ApimartApi {
    /// Create a new API client.
    ///
    /// * `base_url` - e.g. `https://api.apimart.ai` (no trailing slash).
    /// * `api_key`  - bearer token for the `Authorization` header.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Submit a generation request.
    ///
    /// Validates the request locally, then sends
    /// `POST /v1/images/generations`. Returns the vendor-assigned task ID.
    /// A non-200 envelope code or an absent task ID is a submission error
    /// carrying the vendor's message or [`GENERIC_SUBMIT_ERROR`].
    pub async fn submit(&self, request: &GenerationRequest) -> Result<TaskId, ApimartApiError> {
        validate_request(request)?;

        let response = self
            .client
            .post(format!("{}/v1/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let envelope: Envelope<Vec<SubmitData>> = Self::parse_response(response).await?;
        let message = envelope
            .message
            .clone()
            .unwrap_or_else(|| GENERIC_SUBMIT_ERROR.to_string());

        if envelope.code != VENDOR_OK {
            return Err(ApimartApiError::Vendor { message });
        }
        envelope
            .data
            .and_then(|tasks| tasks.into_iter().next())
            .map(|task| TaskId::new(task.task_id))
            .ok_or(ApimartApiError::Vendor { message })
    }

    /// Fetch and normalize the status of one task.
    ///
    /// Sends `GET /v1/tasks/{task_id}?language=zh` (the `language`
    /// parameter is part of the observed vendor contract).
    pub async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskSnapshot, ApimartApiError> {
        let response = self
            .client
            .get(format!("{}/v1/tasks/{}", self.base_url, task_id))
            .query(&[("language", "zh")])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let envelope: Envelope<StatusPayload> = Self::parse_response(response).await?;
        if envelope.code != VENDOR_OK {
            return Err(ApimartApiError::Vendor {
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("Status check failed with code {}", envelope.code)),
            });
        }
        let payload = envelope.data.ok_or(ApimartApiError::Vendor {
            message: "Status response missing data".to_string(),
        })?;
        Ok(normalize_status(&payload))
    }

    /// List generation presets for a category.
    ///
    /// Sends `GET /v1/presets?category={category}`. Callers that browse
    /// repeatedly should go through [`crate::presets::PresetCatalog`]
    /// instead of hitting this directly.
    pub async fn list_presets(&self, category: &str) -> Result<Vec<Preset>, ApimartApiError> {
        let response = self
            .client
            .get(format!("{}/v1/presets", self.base_url))
            .query(&[("category", category)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let envelope: Envelope<Vec<Preset>> = Self::parse_response(response).await?;
        if envelope.code != VENDOR_OK {
            return Err(ApimartApiError::Vendor {
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("Preset listing failed with code {}", envelope.code)),
            });
        }
        Ok(envelope.data.unwrap_or_default())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApimartApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApimartApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApimartApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApimartApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
