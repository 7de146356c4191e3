use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{bail, Result};
use serde_json::Value;
use tryon_contracts::assets::InlineImage;
use tryon_contracts::errors::TryOnError;
use tryon_contracts::events::{EventWriter, SessionEvent};
use tryon_contracts::models::ModelSpec;
use tryon_contracts::policy::SafetyPolicy;
use tryon_contracts::pose::Pose;
use tryon_contracts::recommendation::Recommendation;
use tryon_contracts::runs::receipts::CallRecord;

use crate::backend::{
    BackendRegistry, BackendRequest, BackendResponse, GenerationBackend, Modality,
    ReasoningEffort, RequestPurpose,
};
use crate::prompts;
use crate::text::{error_chain_text, extract_json_from_text, refusal_preview};

pub const FALLBACK_STYLE_REVIEW: &str =
    "This look suits you really well. The color and fit work nicely together with your style.";
pub const REFUSAL_PREVIEW_CHARS: usize = 200;
const ERROR_DETAIL_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub valid: bool,
    pub reason: Option<String>,
}

impl SafetyVerdict {
    fn rejected() -> Self {
        Self {
            valid: false,
            reason: None,
        }
    }
}

/// The backend-facing half of the try-on flow: the safety gate plus the four
/// generation calls.
///
/// Text work (safety, review, recommendations) goes to the text model; image
/// synthesis goes to the image model. Every exchange is logged as a
/// `backend_call` event and kept for the cycle receipt.
pub struct Stylist {
    backends: BackendRegistry,
    text_model: ModelSpec,
    image_model: ModelSpec,
    text_backend: Arc<dyn GenerationBackend>,
    image_backend: Arc<dyn GenerationBackend>,
    policy: SafetyPolicy,
    events: Option<EventWriter>,
    calls: Mutex<Vec<CallRecord>>,
}

impl Stylist {
    pub fn new(
        backends: &BackendRegistry,
        text_model: ModelSpec,
        image_model: ModelSpec,
    ) -> Result<Self> {
        let text_backend = resolve_backend(backends, &text_model)?;
        let image_backend = resolve_backend(backends, &image_model)?;
        Ok(Self {
            backends: backends.clone(),
            text_model,
            image_model,
            text_backend,
            image_backend,
            policy: SafetyPolicy::default(),
            events: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_policy(mut self, policy: SafetyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn text_model(&self) -> &ModelSpec {
        &self.text_model
    }

    pub fn image_model(&self) -> &ModelSpec {
        &self.image_model
    }

    pub fn set_text_model(&mut self, model: ModelSpec) -> Result<()> {
        self.text_backend = resolve_backend(&self.backends, &model)?;
        self.text_model = model;
        Ok(())
    }

    pub fn set_image_model(&mut self, model: ModelSpec) -> Result<()> {
        self.image_backend = resolve_backend(&self.backends, &model)?;
        self.image_model = model;
        Ok(())
    }

    /// Drains the exchanges recorded since the last call.
    pub fn take_calls(&self) -> Vec<CallRecord> {
        self.calls
            .lock()
            .map(|mut calls| std::mem::take(&mut *calls))
            .unwrap_or_default()
    }

    /// Classifies the garment against the fixed policy.
    ///
    /// An unparseable answer is a rejection. A failed exchange is
    /// `ServiceUnavailable`, never a pass.
    pub fn check_garment_safety(
        &self,
        garment: &InlineImage,
    ) -> Result<SafetyVerdict, TryOnError> {
        let model = &self.text_model;
        let request = BackendRequest::new(RequestPurpose::SafetyCheck, model, Modality::Text)
            .image(garment)
            .text(self.policy.instruction())
            .schema(model, prompts::safety_schema())
            .reasoning(model, ReasoningEffort::Low);
        let response = self
            .exchange(self.text_backend.as_ref(), &request)
            .map_err(|err| TryOnError::ServiceUnavailable(error_detail(&err)))?;

        let Some(Value::Object(verdict)) = extract_json_from_text(&response.text(), '{', '}') else {
            return Ok(SafetyVerdict::rejected());
        };
        let Some(valid) = verdict.get("valid").and_then(Value::as_bool) else {
            return Ok(SafetyVerdict::rejected());
        };
        let reason = verdict
            .get("reason")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(SafetyVerdict { valid, reason })
    }

    pub fn composite_try_on(
        &self,
        person: &InlineImage,
        garment: &InlineImage,
        instructions: &str,
        pose: &Pose,
    ) -> Result<InlineImage, TryOnError> {
        let request =
            BackendRequest::new(RequestPurpose::Composite, &self.image_model, Modality::Image)
                .image(person)
                .image(garment)
                .text(prompts::composite_instruction(pose, instructions));
        let response = self
            .exchange(self.image_backend.as_ref(), &request)
            .map_err(|err| TryOnError::GenerationRefused(error_detail(&err)))?;
        image_or_refusal(&response)
    }

    /// Falls back to [`FALLBACK_STYLE_REVIEW`] on any failure.
    pub fn fetch_style_review(&self, person: &InlineImage, garment: &InlineImage) -> String {
        let model = &self.text_model;
        let request = BackendRequest::new(RequestPurpose::StyleReview, model, Modality::Text)
            .image(person)
            .image(garment)
            .text(prompts::style_review_instruction())
            .reasoning(model, ReasoningEffort::Minimal);
        match self.exchange(self.text_backend.as_ref(), &request) {
            Ok(response) => {
                let text = response.text().trim().to_string();
                if text.is_empty() {
                    FALLBACK_STYLE_REVIEW.to_string()
                } else {
                    text
                }
            }
            Err(_) => FALLBACK_STYLE_REVIEW.to_string(),
        }
    }

    /// Falls back to an empty list on any failure.
    pub fn fetch_recommendations(&self, garment: &InlineImage) -> Vec<Recommendation> {
        let model = &self.text_model;
        let request = BackendRequest::new(RequestPurpose::Recommendations, model, Modality::Text)
            .image(garment)
            .text(prompts::recommendations_instruction())
            .schema(model, prompts::recommendations_schema())
            .reasoning(model, ReasoningEffort::Minimal);
        let Ok(response) = self.exchange(self.text_backend.as_ref(), &request) else {
            return Vec::new();
        };
        parse_recommendations(&response.text())
    }

    pub fn synthesize_product_image(
        &self,
        recommendation: &Recommendation,
    ) -> Result<InlineImage, TryOnError> {
        let request = BackendRequest::new(
            RequestPurpose::ProductImage,
            &self.image_model,
            Modality::Image,
        )
        .text(prompts::product_image_instruction(recommendation));
        let response = self
            .exchange(self.image_backend.as_ref(), &request)
            .map_err(|err| TryOnError::VisualizationFailed(error_detail(&err)))?;
        image_or_refusal(&response).map_err(|err| TryOnError::VisualizationFailed(err.to_string()))
    }

    fn exchange(
        &self,
        backend: &dyn GenerationBackend,
        request: &BackendRequest,
    ) -> Result<BackendResponse> {
        let started = Instant::now();
        let outcome = backend.generate(request);
        let latency_ms = started.elapsed().as_millis() as u64;

        let record = CallRecord {
            purpose: request.purpose.as_str().to_string(),
            model: request.model.clone(),
            ok: outcome.is_ok(),
            latency_ms,
            prompt: request.prompt_text(),
            backend_response: outcome
                .as_ref()
                .map(|response| response.metadata.clone())
                .unwrap_or_default(),
            error: outcome
                .as_ref()
                .err()
                .map(error_detail),
        };
        if let Some(events) = self.events.as_ref() {
            let _ = events.emit(&SessionEvent::BackendCall {
                purpose: record.purpose.clone(),
                backend: backend.name().to_string(),
                model: record.model.clone(),
                ok: record.ok,
                latency_ms: record.latency_ms,
                error: record.error.clone(),
            });
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(record);
        }
        outcome
    }
}

fn error_detail(err: &anyhow::Error) -> String {
    error_chain_text(err, ERROR_DETAIL_CHARS)
}

fn resolve_backend(
    backends: &BackendRegistry,
    model: &ModelSpec,
) -> Result<Arc<dyn GenerationBackend>> {
    let Some(backend) = backends.get(&model.backend) else {
        bail!(
            "no backend '{}' registered for model {}",
            model.backend,
            model.name
        );
    };
    Ok(backend)
}

fn image_or_refusal(response: &BackendResponse) -> Result<InlineImage, TryOnError> {
    if let Some(image) = response.first_image() {
        return Ok(image.clone());
    }
    let preview = refusal_preview(&response.text(), REFUSAL_PREVIEW_CHARS);
    if preview.is_empty() {
        return Err(TryOnError::NoImageReturned);
    }
    Err(TryOnError::GenerationRefused(preview))
}

fn parse_recommendations(text: &str) -> Vec<Recommendation> {
    let Some(Value::Array(items)) = extract_json_from_text(text, '[', ']') else {
        return Vec::new();
    };
    items.iter().filter_map(Recommendation::from_value).collect()
}
