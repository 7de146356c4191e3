use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};
use tryon_contracts::assets::InlineImage;
use tryon_contracts::models::ModelSpec;

/// Which adapter operation a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestPurpose {
    SafetyCheck,
    Composite,
    Recommendations,
    StyleReview,
    ProductImage,
}

impl RequestPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SafetyCheck => "safety_check",
            Self::Composite => "composite",
            Self::Recommendations => "recommendations",
            Self::StyleReview => "style_review",
            Self::ProductImage => "product_image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Requested token budget before the model's own limits are applied.
    pub fn thinking_budget(&self) -> u32 {
        match self {
            Self::Minimal => 0,
            Self::Low => 1024,
            Self::Medium => 8192,
            Self::High => 24576,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPart {
    Image(InlineImage),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub purpose: RequestPurpose,
    pub model: String,
    pub parts: Vec<RequestPart>,
    pub response_schema: Option<Value>,
    pub thinking_budget: Option<u32>,
    pub modality: Modality,
}

impl BackendRequest {
    /// Starts a request; images go first, the directive text last.
    pub fn new(purpose: RequestPurpose, model: &ModelSpec, modality: Modality) -> Self {
        Self {
            purpose,
            model: model.name.clone(),
            parts: Vec::new(),
            response_schema: None,
            thinking_budget: None,
            modality,
        }
    }

    pub fn image(mut self, image: &InlineImage) -> Self {
        self.parts.push(RequestPart::Image(image.clone()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(RequestPart::Text(text.into()));
        self
    }

    /// Attaches a response schema if the model accepts one.
    pub fn schema(mut self, model: &ModelSpec, schema: Value) -> Self {
        if model.accepts_schema() && self.modality == Modality::Text {
            self.response_schema = Some(schema);
        }
        self
    }

    /// Resolves `effort` against the model's thinking limits.
    pub fn reasoning(mut self, model: &ModelSpec, effort: ReasoningEffort) -> Self {
        if self.modality == Modality::Text {
            self.thinking_budget = model.thinking_budget(effort.thinking_budget());
        }
        self
    }

    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                RequestPart::Text(text) => Some(text.as_str()),
                RequestPart::Image(_) => None,
            })
            .collect::<Vec<&str>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackendResponse {
    pub texts: Vec<String>,
    pub images: Vec<InlineImage>,
    pub metadata: Map<String, Value>,
}

impl BackendResponse {
    pub fn text(&self) -> String {
        self.texts.join("")
    }

    pub fn first_image(&self) -> Option<&InlineImage> {
        self.images.first()
    }
}

/// One request/response exchange with a hosted generative model.
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &BackendRequest) -> Result<BackendResponse>;
}

#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn GenerationBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<B: GenerationBackend + 'static>(&mut self, backend: B) {
        self.backends
            .insert(backend.name().to_string(), Arc::new(backend));
    }

    pub fn register_shared(&mut self, backend: Arc<dyn GenerationBackend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerationBackend>> {
        self.backends.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tryon_contracts::assets::InlineImage;
    use tryon_contracts::models::ModelRegistry;

    use super::{BackendRequest, Modality, ReasoningEffort, RequestPart, RequestPurpose};

    #[test]
    fn image_profile_drops_schema_and_reasoning() {
        let registry = ModelRegistry::default();
        let model = registry.get("gemini-2.5-flash-image").unwrap();
        let request = BackendRequest::new(RequestPurpose::Composite, model, Modality::Image)
            .schema(model, json!({"type": "OBJECT"}))
            .reasoning(model, ReasoningEffort::High)
            .text("dress");
        assert!(request.response_schema.is_none());
        assert!(request.thinking_budget.is_none());
    }

    #[test]
    fn text_profile_keeps_hints_and_part_order() {
        let registry = ModelRegistry::default();
        let model = registry.get("gemini-2.5-flash").unwrap();
        let garment = InlineImage::from_bytes(b"g", "image/png");
        let request = BackendRequest::new(RequestPurpose::SafetyCheck, model, Modality::Text)
            .image(&garment)
            .text("check")
            .schema(model, json!({"type": "OBJECT"}))
            .reasoning(model, ReasoningEffort::Low);
        assert!(request.response_schema.is_some());
        assert_eq!(request.thinking_budget, Some(1024));
        assert!(matches!(request.parts[0], RequestPart::Image(_)));
        assert_eq!(request.prompt_text(), "check");
    }

    #[test]
    fn minimal_effort_respects_models_that_must_think() {
        let registry = ModelRegistry::default();
        let budget = |name: &str| {
            let model = registry.get(name).unwrap();
            BackendRequest::new(RequestPurpose::SafetyCheck, model, Modality::Text)
                .reasoning(model, ReasoningEffort::Minimal)
                .thinking_budget
        };
        assert_eq!(budget("gemini-2.5-flash"), Some(0));
        assert_eq!(budget("gemini-2.5-pro"), Some(128));
        assert_eq!(budget("gemini-2.0-flash"), None);
    }
}
