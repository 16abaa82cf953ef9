pub mod cycle;
pub mod overlay_pipeline;

pub use cycle::{CycleCoordinator, OverlaySessions};
pub use overlay_pipeline::OverlayPipeline;
