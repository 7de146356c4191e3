mod registry;
mod selectors;

pub use registry::{ModelProfile, ModelRegistry, ModelSpec, Thinking};
pub use selectors::{Fallback, ModelSelection, ModelSelector, NoModelForProfile};
