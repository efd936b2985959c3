//! Wire types for the scoring service. Field names follow the service
//! contract; response fields that may be absent are `Option` and are
//! validated after parsing, never assumed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ImageRef {
    pub base64: String,
}

#[derive(Debug, Serialize)]
pub struct SingleRequest {
    pub original_image: ImageRef,
    pub compare_image: ImageRef,
}

#[derive(Debug, Deserialize)]
pub struct SingleResponse {
    pub similarity: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CandidateEntry {
    pub image: ImageRef,
}

#[derive(Debug, Serialize)]
pub struct MultipleRequest {
    pub original_image: ImageRef,
    pub compare_images: Vec<CandidateEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireResult {
    pub index: usize,
    pub similarity: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MultipleResponse {
    pub results: Option<Vec<WireResult>>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LlmRequest {
    pub original_image: ImageRef,
    pub compare_image: ImageRef,
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub similarity: Option<f64>,
    pub original_image_description: Option<String>,
    pub compare_image_description: Option<String>,
    pub llm_response: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Option<f64>,
}

/// Error body the service attaches to failure statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}
