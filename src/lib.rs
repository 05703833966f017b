pub mod geometry;
pub mod logging;
pub mod mask;
pub mod platform;
pub mod runtime;
pub mod settings;
pub mod tracking;

pub use runtime::{TrackerEvent, TrackerRuntime};
pub use settings::TrackerSettings;
pub use tracking::{OverlayController, TrackingPolicy};
