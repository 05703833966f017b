pub mod backend;
pub mod classify;
pub mod controller;
pub mod model;
pub mod observer;
pub mod predictor;
pub mod resolver;
pub mod scheduler;

pub use controller::{Collaborators, ControllerConfig, OverlayController, PredictionConfig};
pub use model::{
    ActiveWindowSnapshot, DisplayId, DisplayInfo, DisplayLinkTick, DisplayPolicy, MaskDiagnostics,
    MaskRegion, MaskingMode, PointerEvent, ProcessId, Purpose, TrackingPolicy, TrackingProfile,
    TrackingProfileKind, WindowId,
};
pub use observer::TrackerObserver;
pub use predictor::{MotionPredictor, PredictorConfig};
pub use resolver::{
    ResolutionStrategy, ResolveRequest, ResolverConfig, SnapshotProvider, WindowSnapshotResolver,
};
pub use scheduler::{InteractionTiming, TrackingScheduler, TrackingState};
