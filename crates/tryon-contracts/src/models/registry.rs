use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// The two roles a model can play in a try-on session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProfile {
    /// Vision input with text or JSON output: safety, review, recommendations.
    Text,
    /// Image and text input with image output: composite and product shots.
    Image,
}

impl fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// What thinking budgets a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thinking {
    /// The request must not carry a thinking configuration.
    Unsupported,
    /// Any budget up to `max`; zero turns thinking off.
    Optional { max: u32 },
    /// Thinking cannot be turned off; budgets below `min` are raised.
    Required { min: u32, max: u32 },
}

impl Thinking {
    /// The budget to send for `requested`, or `None` to send no thinking config.
    pub fn budget(self, requested: u32) -> Option<u32> {
        match self {
            Self::Unsupported => None,
            Self::Optional { max } => Some(requested.min(max)),
            Self::Required { min, max } => Some(requested.clamp(min, max)),
        }
    }
}

impl fmt::Display for Thinking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "no-thinking"),
            Self::Optional { max } => write!(f, "thinking<={max}"),
            Self::Required { min, max } => write!(f, "thinking {min}..={max}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub backend: String,
    pub profile: ModelProfile,
    pub thinking: Thinking,
}

impl ModelSpec {
    pub fn text(name: &str, backend: &str, thinking: Thinking) -> Self {
        Self {
            name: name.to_string(),
            backend: backend.to_string(),
            profile: ModelProfile::Text,
            thinking,
        }
    }

    pub fn image(name: &str, backend: &str) -> Self {
        Self {
            name: name.to_string(),
            backend: backend.to_string(),
            profile: ModelProfile::Image,
            thinking: Thinking::Unsupported,
        }
    }

    /// Only the text profile takes a JSON response schema.
    pub fn accepts_schema(&self) -> bool {
        self.profile == ModelProfile::Text
    }

    pub fn thinking_budget(&self, requested: u32) -> Option<u32> {
        match self.profile {
            ModelProfile::Text => self.thinking.budget(requested),
            ModelProfile::Image => None,
        }
    }
}

/// Known models in preference order; the first model of a profile is its default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_models([
            ModelSpec::text("gemini-2.5-flash", "gemini", Thinking::Optional { max: 24_576 }),
            ModelSpec::text(
                "gemini-2.5-pro",
                "gemini",
                Thinking::Required {
                    min: 128,
                    max: 32_768,
                },
            ),
            ModelSpec::text("gemini-2.0-flash", "gemini", Thinking::Unsupported),
            ModelSpec::image("gemini-2.5-flash-image", "gemini"),
            ModelSpec::image("gemini-3-pro-image-preview", "gemini"),
            ModelSpec::text("dryrun-text-1", "dryrun", Thinking::Optional { max: 24_576 }),
            ModelSpec::image("dryrun-image-1", "dryrun"),
        ])
    }
}

impl ModelRegistry {
    pub fn from_models(models: impl IntoIterator<Item = ModelSpec>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|model| (model.name.clone(), model))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name.trim())
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn for_profile(&self, profile: ModelProfile) -> impl Iterator<Item = &ModelSpec> {
        self.models
            .values()
            .filter(move |model| model.profile == profile)
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelProfile, ModelRegistry, ModelSpec, Thinking};

    #[test]
    fn image_models_take_no_hints() {
        let registry = ModelRegistry::default();
        for model in registry.for_profile(ModelProfile::Image) {
            assert!(!model.accepts_schema(), "{}", model.name);
            assert_eq!(model.thinking_budget(1024), None, "{}", model.name);
        }
    }

    #[test]
    fn thinking_budgets_respect_each_model() {
        let registry = ModelRegistry::default();
        let budget = |name: &str, requested: u32| {
            registry
                .get(name)
                .and_then(|model| model.thinking_budget(requested))
        };
        assert_eq!(budget("gemini-2.5-flash", 0), Some(0));
        assert_eq!(budget("gemini-2.5-pro", 0), Some(128));
        assert_eq!(budget("gemini-2.5-pro", 100_000), Some(32_768));
        assert_eq!(budget("gemini-2.0-flash", 1024), None);
    }

    #[test]
    fn profile_order_follows_insertion() {
        let registry = ModelRegistry::from_models([
            ModelSpec::image("second-choice", "dryrun"),
            ModelSpec::text("reader", "dryrun", Thinking::Unsupported),
            ModelSpec::image("third-choice", "dryrun"),
        ]);
        let names: Vec<&str> = registry
            .for_profile(ModelProfile::Image)
            .map(|model| model.name.as_str())
            .collect();
        assert_eq!(names, ["second-choice", "third-choice"]);
    }
}
