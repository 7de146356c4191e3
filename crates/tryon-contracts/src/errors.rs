use thiserror::Error;

/// Failures a try-on cycle can surface to the user.
///
/// The `Display` text of each variant is what the presentation layer shows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TryOnError {
    #[error("Invalid image data: {0}")]
    Format(String),
    #[error("Safety check failed: {0}")]
    SafetyRejected(String),
    #[error("Safety check unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("The model did not return an image: {0}")]
    GenerationRefused(String),
    #[error("No image was returned by the model.")]
    NoImageReturned,
    #[error("{0}")]
    VisualizationFailed(String),
}

impl TryOnError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Format(_) => "format_error",
            Self::SafetyRejected(_) => "safety_rejected",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::GenerationRefused(_) => "generation_refused",
            Self::NoImageReturned => "no_image_returned",
            Self::VisualizationFailed(_) => "visualization_failed",
        }
    }
}

/// Why the controller refused a transition. The state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotReady {
    #[error("select a photo of the person first")]
    MissingPerson,
    #[error("select a garment first")]
    MissingGarment,
    #[error("a generation is already in progress")]
    Busy,
    #[error("recommendations can only be applied to a finished try-on")]
    NoResult,
    #[error("no recommendation at position {0}")]
    UnknownRecommendation(usize),
}

#[cfg(test)]
mod tests {
    use super::TryOnError;

    #[test]
    fn safety_rejection_keeps_reason_verbatim() {
        let err = TryOnError::SafetyRejected("contains swimwear".to_string());
        assert_eq!(err.to_string(), "Safety check failed: contains swimwear");
        assert_eq!(err.kind(), "safety_rejected");
    }

    #[test]
    fn visualization_failure_shows_message_only() {
        let err = TryOnError::VisualizationFailed("Try again later.".to_string());
        assert_eq!(err.to_string(), "Try again later.");
    }
}
