pub mod backend;
pub mod capture;
pub mod config;
pub mod controller;
pub mod dryrun;
pub mod gemini;
pub mod prompts;
pub mod stylist;
pub mod text;

pub use backend::{BackendRegistry, BackendRequest, BackendResponse, GenerationBackend};
pub use capture::{CaptureBridge, FrameFileSurface, RenderSurface};
pub use config::EngineConfig;
pub use controller::{SessionOptions, TryOnController, VISUALIZATION_FAILED_MESSAGE};
pub use dryrun::DryrunBackend;
pub use gemini::GeminiBackend;
pub use stylist::Stylist;

/// Every backend the bundled model registry can route to.
pub fn default_backend_registry(config: &EngineConfig) -> BackendRegistry {
    let mut backends = BackendRegistry::new();
    backends.register(DryrunBackend);
    backends.register(GeminiBackend::new(config));
    backends
}
