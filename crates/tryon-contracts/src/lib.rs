pub mod assets;
pub mod chat;
pub mod errors;
pub mod events;
pub mod models;
pub mod policy;
pub mod pose;
pub mod recommendation;
pub mod runs;
pub mod workflow;
