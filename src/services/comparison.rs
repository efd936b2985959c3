use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::config::AppConfig;
use crate::models::error::AppError;
use crate::models::image::{InlinePayload, SlotId};
use crate::models::protocol::{
    CandidateEntry, ErrorBody, HealthResponse, ImageRef, LlmRequest, LlmResponse,
    MultipleRequest, MultipleResponse, SingleRequest, SingleResponse, WireResult,
};
use crate::services::store::{ImageStore, SingleSlot};

/// One candidate's outcome, still tied to its submission position and
/// slot identity. `index` is the position in the submitted candidate
/// list; `slot` resolves the source image at render time.
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub index: usize,
    pub slot: SlotId,
    pub outcome: Result<f64, String>,
}

/// Result of the annotated workflow; all fields are required on the wire.
#[derive(Debug, Clone)]
pub struct AnnotatedComparison {
    pub similarity: f64,
    pub original_description: String,
    pub compare_description: String,
    pub analysis: String,
}

/// Builds requests for the three comparison workflows and interprets the
/// scoring service's responses. Each workflow holds its own gate so at
/// most one call per workflow is in flight; a trigger landing while the
/// gate is held is rejected with `Busy`, not queued.
pub struct ComparisonService {
    config: Arc<AppConfig>,
    client: Client,
    single_gate: Mutex<()>,
    batch_gate: Mutex<()>,
    llm_gate: Mutex<()>,
}

impl ComparisonService {
    pub fn new(config: Arc<AppConfig>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            client,
            single_gate: Mutex::new(()),
            batch_gate: Mutex::new(()),
            llm_gate: Mutex::new(()),
        })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/image/similarity/{}", self.config.api_base, suffix)
    }

    fn ready_payload(slot: &SingleSlot, role: &str) -> Result<InlinePayload, AppError> {
        slot.ready_payload()
            .ok_or_else(|| AppError::ImageNotReady(role.to_string()))
    }

    fn image_ref(payload: &InlinePayload) -> ImageRef {
        ImageRef {
            base64: payload.base64_body().to_string(),
        }
    }

    fn check_range(similarity: f64) -> Result<f64, AppError> {
        if (0.0..=1.0).contains(&similarity) {
            Ok(similarity)
        } else {
            Err(AppError::MalformedResponse(format!(
                "similarity {} outside [0, 1]",
                similarity
            )))
        }
    }

    /// Posts a request and peels off transport and status-level failures,
    /// preferring the service's own error message when the body carries one.
    async fn post_json<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        request: &Req,
    ) -> Result<Resp, AppError> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("service returned status {}", status));
            return Err(AppError::Service(message));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(e.to_string()))
    }

    /// Pairwise comparison of two ready images.
    pub async fn compare_single(
        &self,
        original: &SingleSlot,
        candidate: &SingleSlot,
    ) -> Result<f64, AppError> {
        let original = Self::ready_payload(original, "original image")?;
        let candidate = Self::ready_payload(candidate, "comparison image")?;
        let _guard = self
            .single_gate
            .try_lock()
            .map_err(|_| AppError::Busy("single"))?;

        let request = SingleRequest {
            original_image: Self::image_ref(&original),
            compare_image: Self::image_ref(&candidate),
        };

        info!("sending single comparison request");
        let parsed: SingleResponse = self.post_json(&self.endpoint("single"), &request).await?;

        if let Some(error) = parsed.error {
            return Err(AppError::Service(error));
        }
        let similarity = parsed
            .similarity
            .ok_or_else(|| AppError::MalformedResponse("similarity field missing".to_string()))?;
        Self::check_range(similarity)
    }

    /// Scores the original against every image in the store, in store
    /// order. Results are correlated back to candidates solely by the
    /// `index` field each result carries; the response list's physical
    /// order is never used.
    pub async fn compare_batch(
        &self,
        original: &SingleSlot,
        store: &ImageStore,
    ) -> Result<Vec<CandidateResult>, AppError> {
        let original = Self::ready_payload(original, "original image")?;
        let candidates = store.snapshot();
        if candidates.is_empty() {
            return Err(AppError::EmptyCandidateList);
        }
        let mut slots = Vec::with_capacity(candidates.len());
        let mut entries = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let payload = candidate
                .state
                .payload()
                .ok_or_else(|| AppError::ImageNotReady(candidate.source_name.clone()))?;
            slots.push(candidate.id);
            entries.push(CandidateEntry {
                image: Self::image_ref(payload),
            });
        }
        let _guard = self
            .batch_gate
            .try_lock()
            .map_err(|_| AppError::Busy("batch"))?;

        let request = MultipleRequest {
            original_image: Self::image_ref(&original),
            compare_images: entries,
        };

        info!(candidates = slots.len(), "sending batch comparison request");
        let parsed: MultipleResponse = self.post_json(&self.endpoint("multiple"), &request).await?;

        if let Some(error) = parsed.error {
            return Err(AppError::Service(error));
        }
        let wire_results = parsed
            .results
            .ok_or_else(|| AppError::MalformedResponse("results field missing".to_string()))?;

        let mut by_index: Vec<Option<WireResult>> = vec![None; slots.len()];
        for result in wire_results {
            match by_index.get_mut(result.index) {
                Some(entry) => {
                    if entry.is_none() {
                        *entry = Some(result);
                    } else {
                        warn!(index = result.index, "duplicate result index, kept first");
                    }
                }
                None => warn!(index = result.index, "result index out of range, dropped"),
            }
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                let outcome = match by_index[index].take() {
                    Some(r) => match (r.error, r.similarity) {
                        (Some(error), _) => Err(error),
                        (None, Some(s)) if (0.0..=1.0).contains(&s) => Ok(s),
                        (None, Some(s)) => Err(format!("similarity {} outside [0, 1]", s)),
                        (None, None) => Err("malformed result entry".to_string()),
                    },
                    None => Err("no result returned for this image".to_string()),
                };
                CandidateResult { index, slot, outcome }
            })
            .collect();
        Ok(results)
    }

    /// Comparison augmented with image descriptions and free-form
    /// analysis. Absence of any response field fails the whole operation.
    pub async fn compare_with_annotation(
        &self,
        original: &SingleSlot,
        candidate: &SingleSlot,
        question: &str,
    ) -> Result<AnnotatedComparison, AppError> {
        let original = Self::ready_payload(original, "original image")?;
        let candidate = Self::ready_payload(candidate, "comparison image")?;
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::EmptyQuestion);
        }
        let _guard = self.llm_gate.try_lock().map_err(|_| AppError::Busy("llm"))?;

        let request = LlmRequest {
            original_image: Self::image_ref(&original),
            compare_image: Self::image_ref(&candidate),
            question: question.to_string(),
        };

        info!("sending annotated comparison request");
        let parsed: LlmResponse = self.post_json(&self.endpoint("llm"), &request).await?;

        if let Some(error) = parsed.error {
            return Err(AppError::Service(error));
        }
        let missing = |field: &str| AppError::MalformedResponse(format!("{} field missing", field));
        let similarity = Self::check_range(parsed.similarity.ok_or_else(|| missing("similarity"))?)?;
        Ok(AnnotatedComparison {
            similarity,
            original_description: parsed
                .original_image_description
                .ok_or_else(|| missing("original_image_description"))?,
            compare_description: parsed
                .compare_image_description
                .ok_or_else(|| missing("compare_image_description"))?,
            analysis: parsed.llm_response.ok_or_else(|| missing("llm_response"))?,
        })
    }

    /// Probes the service's health endpoint.
    pub async fn health(&self) -> Result<HealthResponse, AppError> {
        let url = format!("{}/health", self.config.api_base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Service(format!(
                "health check returned status {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::image::PayloadState;

    fn service() -> ComparisonService {
        // Port 1 is never listening; these tests must fail before any
        // network call happens.
        let config = Arc::new(AppConfig {
            api_base: "http://127.0.0.1:1/api".to_string(),
            request_timeout_secs: 1,
            max_image_bytes: 1024,
            log_level: "info".to_string(),
        });
        ComparisonService::new(config).unwrap()
    }

    fn ready_slot(tag: &str) -> SingleSlot {
        let slot = SingleSlot::new();
        let token = slot.reserve();
        slot.fill(
            token,
            PayloadState::Ready(InlinePayload {
                mime_type: "image/png".to_string(),
                base64: tag.to_string(),
            }),
        );
        slot
    }

    #[tokio::test]
    async fn single_rejects_unready_original_before_network() {
        let svc = service();
        let err = svc
            .compare_single(&SingleSlot::new(), &ready_slot("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ImageNotReady(_)));
    }

    #[tokio::test]
    async fn batch_rejects_empty_candidate_list() {
        let svc = service();
        let store = ImageStore::new();
        let err = svc
            .compare_batch(&ready_slot("o"), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyCandidateList));
    }

    #[tokio::test]
    async fn batch_rejects_pending_candidate() {
        let svc = service();
        let store = ImageStore::new();
        store.reserve("pending.png");
        let err = svc
            .compare_batch(&ready_slot("o"), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ImageNotReady(_)));
    }

    #[tokio::test]
    async fn annotation_rejects_whitespace_question() {
        let svc = service();
        let err = svc
            .compare_with_annotation(&ready_slot("o"), &ready_slot("c"), "   \n\t")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyQuestion));
    }
}
