pub mod deployment_tracker;
pub mod orchestrator;
pub mod reconciler;
pub mod resources;
pub mod sync;
