use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tryon_contracts::assets::{AssetRole, AssetSource, ImageAsset, InlineImage};
use tryon_contracts::errors::{NotReady, TryOnError};
use tryon_contracts::events::{EventWriter, SessionEvent};
use tryon_contracts::models::{ModelProfile, ModelSelection, ModelSelector};
use tryon_contracts::pose::Pose;
use tryon_contracts::recommendation::Recommendation;
use tryon_contracts::runs::receipts::{build_receipt, write_receipt, TryOnRequest};
use tryon_contracts::runs::summary::{now_utc_iso, write_summary, SessionSummary};
use tryon_contracts::workflow::{GenerationResult, ProcessingStage, WorkflowState};

use crate::config::EngineConfig;
use crate::default_backend_registry;
use crate::stylist::{Stylist, FALLBACK_STYLE_REVIEW};

pub const VISUALIZATION_FAILED_MESSAGE: &str =
    "We couldn't visualize that item right now. Please try again.";
pub const DEFAULT_REJECTION_REASON: &str = "This item can't be tried on.";

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub config: EngineConfig,
}

#[derive(Debug, Clone, Default)]
struct SessionStats {
    cycles: u64,
    successes: u64,
    failures: u64,
    recommendations_applied: u64,
    last_artifact: Option<PathBuf>,
}

type Observer = Box<dyn FnMut(&WorkflowState)>;

/// Owns the try-on workflow: the selected inputs and the one workflow state.
///
/// `generate` runs the safety gate, then the composite, recommendation and
/// review calls in parallel. `apply_recommendation` swaps in a synthesized
/// garment and returns to `Idle` so the next cycle is started explicitly.
pub struct TryOnController {
    stylist: Stylist,
    run_dir: PathBuf,
    events: EventWriter,
    state: WorkflowState,
    person: Option<ImageAsset>,
    garment: Option<ImageAsset>,
    instructions: String,
    pose: Pose,
    started_at: String,
    stats: SessionStats,
    observer: Option<Observer>,
}

impl TryOnController {
    /// Opens a session in `run_dir` using the configured backends.
    pub fn open(
        run_dir: impl AsRef<Path>,
        events_path: impl AsRef<Path>,
        options: SessionOptions,
    ) -> Result<Self> {
        let run_dir = run_dir.as_ref().to_path_buf();
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("failed to create {}", run_dir.display()))?;
        let events = EventWriter::new(events_path.as_ref(), uuid::Uuid::new_v4().to_string());

        let selector = ModelSelector::default();
        let requested_text = options
            .text_model
            .as_deref()
            .unwrap_or(&options.config.text_model);
        let requested_image = options
            .image_model
            .as_deref()
            .unwrap_or(&options.config.image_model);
        let text = selector.select(ModelProfile::Text, Some(requested_text))?;
        let image = selector.select(ModelProfile::Image, Some(requested_image))?;
        for selection in [&text, &image] {
            log_fallback(&events, selection)?;
        }

        let backends = default_backend_registry(&options.config);
        let stylist = Stylist::new(&backends, text.model, image.model)?.with_events(events.clone());
        Self::with_stylist(run_dir, events, stylist)
    }

    pub fn with_stylist(run_dir: PathBuf, events: EventWriter, stylist: Stylist) -> Result<Self> {
        let controller = Self {
            stylist,
            run_dir,
            events,
            state: WorkflowState::default(),
            person: None,
            garment: None,
            instructions: String::new(),
            pose: Pose::Original,
            started_at: now_utc_iso(),
            stats: SessionStats::default(),
            observer: None,
        };
        controller.events.emit(&SessionEvent::SessionStarted {
            run_dir: controller.run_dir.to_string_lossy().to_string(),
            text_model: controller.stylist.text_model().name.clone(),
            image_model: controller.stylist.image_model().name.clone(),
        })?;
        Ok(controller)
    }

    /// Called with every state the workflow enters.
    pub fn set_observer(&mut self, observer: impl FnMut(&WorkflowState) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.state.result()
    }

    pub fn person(&self) -> Option<&ImageAsset> {
        self.person.as_ref()
    }

    pub fn garment(&self) -> Option<&ImageAsset> {
        self.garment.as_ref()
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn stylist(&self) -> &Stylist {
        &self.stylist
    }

    pub fn can_generate(&self) -> bool {
        !self.state.is_processing() && self.person.is_some() && self.garment.is_some()
    }

    pub fn set_person(&mut self, asset: ImageAsset) -> Result<(), NotReady> {
        self.ensure_not_processing()?;
        self.log_asset(AssetRole::Person, &asset);
        self.person = Some(asset);
        Ok(())
    }

    pub fn set_garment(&mut self, asset: ImageAsset) -> Result<(), NotReady> {
        self.ensure_not_processing()?;
        self.log_asset(AssetRole::Garment, &asset);
        self.garment = Some(asset);
        Ok(())
    }

    pub fn set_instructions(&mut self, text: impl Into<String>) -> Result<(), NotReady> {
        self.ensure_not_processing()?;
        self.instructions = text.into();
        Ok(())
    }

    pub fn set_pose(&mut self, pose: Pose) -> Result<(), NotReady> {
        self.ensure_not_processing()?;
        self.pose = pose;
        Ok(())
    }

    /// Switches the text model; an unknown or image-only name falls back to
    /// the default text model. Returns the model now in use.
    pub fn set_text_model(&mut self, requested: &str) -> Result<String> {
        self.ensure_not_processing()?;
        let selection = ModelSelector::default().select(ModelProfile::Text, Some(requested))?;
        log_fallback(&self.events, &selection)?;
        let name = selection.model.name.clone();
        self.stylist.set_text_model(selection.model)?;
        Ok(name)
    }

    pub fn set_image_model(&mut self, requested: &str) -> Result<String> {
        self.ensure_not_processing()?;
        let selection = ModelSelector::default().select(ModelProfile::Image, Some(requested))?;
        log_fallback(&self.events, &selection)?;
        let name = selection.model.name.clone();
        self.stylist.set_image_model(selection.model)?;
        Ok(name)
    }

    /// Back to `Idle`, keeping the selected inputs.
    pub fn reset(&mut self) -> Result<(), NotReady> {
        self.ensure_not_processing()?;
        self.transition(WorkflowState::default());
        Ok(())
    }

    /// Back to `Idle` with every input dropped.
    pub fn clear(&mut self) -> Result<(), NotReady> {
        self.reset()?;
        self.person = None;
        self.garment = None;
        self.instructions.clear();
        self.pose = Pose::Original;
        Ok(())
    }

    /// Runs one full try-on cycle and returns the state it ended in.
    ///
    /// Refused without touching the state when an input is missing or a cycle
    /// is already running.
    pub fn generate(&mut self) -> Result<&WorkflowState, NotReady> {
        self.ensure_not_processing()?;
        let person = self.person.clone().ok_or(NotReady::MissingPerson)?;
        let garment = self.garment.clone().ok_or(NotReady::MissingGarment)?;

        self.stats.cycles += 1;
        self.stylist.take_calls();
        self.transition(WorkflowState::Processing {
            stage: ProcessingStage::SafetyCheck,
        });

        let next = match self.run_cycle(&person, &garment) {
            Ok(result) => {
                self.stats.successes += 1;
                WorkflowState::Success {
                    result: Box::new(result),
                }
            }
            Err(err) => {
                self.stats.failures += 1;
                self.stylist.take_calls();
                let _ = self.events.emit(&SessionEvent::GenerationFinished {
                    ok: false,
                    error_kind: Some(err.kind()),
                    error: Some(err.to_string()),
                    recommendations: 0,
                    artifact_path: None,
                });
                WorkflowState::Error {
                    message: err.to_string(),
                }
            }
        };
        self.transition(next);
        Ok(&self.state)
    }

    /// Replaces the garment with a product shot of the recommendation at
    /// `index` (zero-based) in the current result.
    ///
    /// Success and failure both land in `Idle`; a failure leaves the garment
    /// untouched and carries a generic notice.
    pub fn apply_recommendation(&mut self, index: usize) -> Result<&WorkflowState, NotReady> {
        let recommendation = match &self.state {
            WorkflowState::Processing { .. } => return Err(NotReady::Busy),
            WorkflowState::Success { result } => result
                .recommendations
                .get(index)
                .cloned()
                .ok_or(NotReady::UnknownRecommendation(index))?,
            _ => return Err(NotReady::NoResult),
        };

        self.transition(WorkflowState::Processing {
            stage: ProcessingStage::Visualizing,
        });
        let outcome = self
            .stylist
            .synthesize_product_image(&recommendation)
            .and_then(|image| {
                ImageAsset::from_inline(
                    AssetSource::Synthesized {
                        item_name: recommendation.item_name.clone(),
                    },
                    image,
                )
            });
        self.stylist.take_calls();

        let (next, garment_path, error) = match outcome {
            Ok(asset) => {
                let garment_path = self
                    .write_garment_artifact(asset.payload())
                    .map(|path| path.to_string_lossy().to_string());
                self.log_asset(AssetRole::Garment, &asset);
                self.garment = Some(asset);
                self.instructions = recommendation.seed_instructions();
                self.stats.recommendations_applied += 1;
                (WorkflowState::Idle { notice: None }, garment_path, None)
            }
            Err(err) => {
                let notice = Some(VISUALIZATION_FAILED_MESSAGE.to_string());
                (WorkflowState::Idle { notice }, None, Some(err.to_string()))
            }
        };
        let _ = self.events.emit(&SessionEvent::RecommendationApplied {
            item_name: recommendation.item_name.clone(),
            color: recommendation.color.clone(),
            ok: error.is_none(),
            garment_path,
            error,
        });
        self.transition(next);
        Ok(&self.state)
    }

    /// Writes `summary.json` and logs the end of the session.
    pub fn finish(&mut self) -> Result<()> {
        let summary = SessionSummary {
            session_id: self.events.session_id().to_string(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            cycles: self.stats.cycles,
            successes: self.stats.successes,
            failures: self.stats.failures,
            recommendations_applied: self.stats.recommendations_applied,
            last_artifact: self
                .stats
                .last_artifact
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
        };
        write_summary(&self.run_dir.join("summary.json"), &summary, None)?;
        self.events.emit(&SessionEvent::SessionFinished {
            cycles: summary.cycles,
            successes: summary.successes,
            failures: summary.failures,
        })?;
        Ok(())
    }

    fn run_cycle(
        &mut self,
        person: &ImageAsset,
        garment: &ImageAsset,
    ) -> Result<GenerationResult, TryOnError> {
        let verdict = self.stylist.check_garment_safety(garment.payload())?;
        let _ = self.events.emit(&SessionEvent::SafetyChecked {
            valid: verdict.valid,
            reason: verdict.reason.clone(),
        });
        if !verdict.valid {
            return Err(TryOnError::SafetyRejected(
                verdict
                    .reason
                    .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
            ));
        }

        self.transition(WorkflowState::Processing {
            stage: ProcessingStage::Generating,
        });
        let (composite, recommendations, feedback) =
            fan_out(&self.stylist, person, garment, &self.instructions, &self.pose);
        let image = composite?;
        image.decode()?;

        let artifact_path = self.write_cycle_artifacts(person, garment, &image, &recommendations);
        let _ = self.events.emit(&SessionEvent::GenerationFinished {
            ok: true,
            error_kind: None,
            error: None,
            recommendations: recommendations.len(),
            artifact_path: artifact_path
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
        });

        Ok(GenerationResult {
            image,
            feedback: Some(feedback),
            recommendations,
            artifact_path,
        })
    }

    fn write_cycle_artifacts(
        &mut self,
        person: &ImageAsset,
        garment: &ImageAsset,
        image: &InlineImage,
        recommendations: &[Recommendation],
    ) -> Option<PathBuf> {
        let stamp = format!("{}-{:02}", timestamp_millis(), self.stats.cycles);
        let image_path = self
            .run_dir
            .join(format!("tryon-{stamp}.{}", image.file_extension()));
        let receipt_path = self.run_dir.join(format!("receipt-tryon-{stamp}.json"));
        let request = TryOnRequest {
            person_digest: person.payload().digest(),
            garment_digest: garment.payload().digest(),
            garment_source: garment.source().label(),
            pose: self.pose.to_string(),
            instructions: self.instructions.clone(),
            text_model: self.stylist.text_model().name.clone(),
            image_model: self.stylist.image_model().name.clone(),
        };
        let calls = self.stylist.take_calls();
        let mut metadata = Map::new();
        metadata.insert(
            "recommendations".to_string(),
            serde_json::to_value(recommendations).unwrap_or(Value::Null),
        );

        let written = write_image(&image_path, image).and_then(|()| {
            let receipt = build_receipt(&request, &calls, &image_path, &receipt_path, &metadata);
            write_receipt(&receipt_path, &receipt)
        });
        match written {
            Ok(()) => {
                self.stats.last_artifact = Some(image_path.clone());
                Some(image_path)
            }
            Err(err) => {
                self.log_write_failure(&err);
                None
            }
        }
    }

    fn write_garment_artifact(&mut self, image: &InlineImage) -> Option<PathBuf> {
        let path = self.run_dir.join(format!(
            "garment-{}-{:02}.{}",
            timestamp_millis(),
            self.stats.recommendations_applied + 1,
            image.file_extension()
        ));
        match write_image(&path, image) {
            Ok(()) => Some(path),
            Err(err) => {
                self.log_write_failure(&err);
                None
            }
        }
    }

    fn log_write_failure(&self, err: &anyhow::Error) {
        let _ = self.events.emit(&SessionEvent::ArtifactWriteFailed {
            error: format!("{err:#}"),
        });
    }

    fn log_asset(&self, role: AssetRole, asset: &ImageAsset) {
        let _ = self.events.emit(&SessionEvent::AssetSelected {
            role,
            source: asset.source().clone(),
            mime_type: asset.payload().mime_type.clone(),
            digest: asset.payload().digest(),
        });
    }

    fn ensure_not_processing(&self) -> Result<(), NotReady> {
        if self.state.is_processing() {
            return Err(NotReady::Busy);
        }
        Ok(())
    }

    fn transition(&mut self, next: WorkflowState) {
        self.state = next;
        let _ = self.events.emit(&SessionEvent::workflow_state(&self.state));
        if let Some(observer) = self.observer.as_mut() {
            observer(&self.state);
        }
    }
}

fn log_fallback(events: &EventWriter, selection: &ModelSelection) -> Result<()> {
    if let Some(reason) = selection.fallback.as_ref() {
        events.emit(&SessionEvent::ModelFallback {
            profile: selection.profile,
            reason: reason.to_string(),
            model: selection.model.name.clone(),
        })?;
    }
    Ok(())
}

/// Dispatches the three generation calls together and waits for all of them.
///
/// Only the composite can fail the cycle; the other two already degrade to
/// defaults inside the stylist.
fn fan_out(
    stylist: &Stylist,
    person: &ImageAsset,
    garment: &ImageAsset,
    instructions: &str,
    pose: &Pose,
) -> (
    Result<InlineImage, TryOnError>,
    Vec<Recommendation>,
    String,
) {
    let (person, garment) = (person.payload(), garment.payload());
    thread::scope(|scope| {
        let composite =
            scope.spawn(|| stylist.composite_try_on(person, garment, instructions, pose));
        let recommendations = scope.spawn(|| stylist.fetch_recommendations(garment));
        let review = scope.spawn(|| stylist.fetch_style_review(person, garment));

        let composite = composite.join().unwrap_or_else(|_| {
            Err(TryOnError::GenerationRefused(
                "image generation worker stopped unexpectedly".to_string(),
            ))
        });
        let recommendations = recommendations.join().unwrap_or_default();
        let review = review
            .join()
            .unwrap_or_else(|_| FALLBACK_STYLE_REVIEW.to_string());
        (composite, recommendations, review)
    })
}

fn write_image(path: &Path, image: &InlineImage) -> Result<()> {
    let bytes = image.decode()?;
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}
