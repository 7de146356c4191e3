use std::path::PathBuf;

use serde::Serialize;

use crate::assets::InlineImage;
use crate::recommendation::Recommendation;

/// Output of one successful try-on cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub image: InlineImage,
    pub feedback: Option<String>,
    pub recommendations: Vec<Recommendation>,
    pub artifact_path: Option<PathBuf>,
}

impl GenerationResult {
    pub fn image_url(&self) -> String {
        self.image.to_data_url()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    SafetyCheck,
    Generating,
    Visualizing,
}

/// The single workflow state owned by the controller.
///
/// Each variant carries only what is meaningful in that state: a finished
/// result exists only in `Success`, an error message only in `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle { notice: Option<String> },
    Processing { stage: ProcessingStage },
    Success { result: Box<GenerationResult> },
    Error { message: String },
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::Idle { notice: None }
    }
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle { .. } => "idle",
            Self::Processing { .. } => "processing",
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing { .. })
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        match self {
            Self::Success { result } => Some(result.as_ref()),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        match self {
            Self::Idle { notice } => notice.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{GenerationResult, ProcessingStage, WorkflowState};
    use crate::assets::InlineImage;

    #[test]
    fn accessors_follow_variant() {
        let idle = WorkflowState::default();
        assert_eq!(idle.name(), "idle");
        assert!(idle.result().is_none());

        let success = WorkflowState::Success {
            result: Box::new(GenerationResult {
                image: InlineImage::from_bytes(b"img", "image/png"),
                feedback: Some("Looks sharp.".to_string()),
                recommendations: Vec::new(),
                artifact_path: None,
            }),
        };
        assert_eq!(
            success.result().map(GenerationResult::image_url).as_deref(),
            Some("data:image/png;base64,aW1n")
        );
        assert!(success.error_message().is_none());

        let error = WorkflowState::Error {
            message: "boom".to_string(),
        };
        assert_eq!(error.error_message(), Some("boom"));
    }

    #[test]
    fn serializes_with_state_tag() {
        let value = serde_json::to_value(WorkflowState::Processing {
            stage: ProcessingStage::SafetyCheck,
        })
        .unwrap();
        assert_eq!(value, json!({"state": "processing", "stage": "safety_check"}));
    }
}
