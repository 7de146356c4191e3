use std::fmt;

use thiserror::Error;

use super::registry::{ModelProfile, ModelRegistry, ModelSpec};

/// Why the selector did not use the requested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    Unspecified,
    Unknown(String),
    WrongProfile(String),
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "no model requested"),
            Self::Unknown(name) => write!(f, "unknown model '{name}'"),
            Self::WrongProfile(name) => write!(f, "'{name}' serves the other profile"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub profile: ModelProfile,
    pub model: ModelSpec,
    pub fallback: Option<Fallback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no {0} model is registered")]
pub struct NoModelForProfile(pub ModelProfile);

/// Resolves a user-supplied model name for one profile.
///
/// An unusable name never fails the session: the profile's default is used
/// and the selection says why.
#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn select(
        &self,
        profile: ModelProfile,
        requested: Option<&str>,
    ) -> Result<ModelSelection, NoModelForProfile> {
        let requested = requested.map(str::trim).filter(|name| !name.is_empty());
        let fallback = match requested.map(|name| (name, self.registry.get(name))) {
            Some((_, Some(model))) if model.profile == profile => {
                return Ok(ModelSelection {
                    profile,
                    model: model.clone(),
                    fallback: None,
                });
            }
            Some((name, Some(_))) => Fallback::WrongProfile(name.to_string()),
            Some((name, None)) => Fallback::Unknown(name.to_string()),
            None => Fallback::Unspecified,
        };
        let model = self
            .registry
            .for_profile(profile)
            .next()
            .ok_or(NoModelForProfile(profile))?;
        Ok(ModelSelection {
            profile,
            model: model.clone(),
            fallback: Some(fallback),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Fallback, ModelSelector, NoModelForProfile};
    use crate::models::{ModelProfile, ModelRegistry, ModelSpec};

    #[test]
    fn known_model_of_the_right_profile_is_used() {
        let selection = ModelSelector::default()
            .select(ModelProfile::Image, Some(" dryrun-image-1 "))
            .unwrap();
        assert_eq!(selection.model.backend, "dryrun");
        assert_eq!(selection.fallback, None);
    }

    #[test]
    fn text_model_requested_for_images_falls_back() {
        let selection = ModelSelector::default()
            .select(ModelProfile::Image, Some("gemini-2.5-pro"))
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-flash-image");
        assert_eq!(
            selection.fallback,
            Some(Fallback::WrongProfile("gemini-2.5-pro".to_string()))
        );
    }

    #[test]
    fn unknown_or_blank_names_use_the_default() {
        let selector = ModelSelector::default();
        let unknown = selector.select(ModelProfile::Text, Some("gpt-5")).unwrap();
        assert_eq!(unknown.model.name, "gemini-2.5-flash");
        assert_eq!(
            unknown.fallback.map(|reason| reason.to_string()).as_deref(),
            Some("unknown model 'gpt-5'")
        );
        let blank = selector.select(ModelProfile::Text, Some("  ")).unwrap();
        assert_eq!(blank.fallback, Some(Fallback::Unspecified));
    }

    #[test]
    fn empty_profile_is_an_error() {
        let selector =
            ModelSelector::new(ModelRegistry::from_models([ModelSpec::image("only", "dryrun")]));
        assert_eq!(
            selector.select(ModelProfile::Text, None).unwrap_err(),
            NoModelForProfile(ModelProfile::Text)
        );
        assert_eq!(
            NoModelForProfile(ModelProfile::Text).to_string(),
            "no text model is registered"
        );
    }
}
