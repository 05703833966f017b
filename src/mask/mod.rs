//! Turning snapshots into per-display cutouts and cutouts into masks.

pub mod diagnostics;
pub mod render;
pub mod requests;

pub use diagnostics::{RenderDiagnostics, RenderMode};
pub use render::{FillRule, MaskBitmap, MaskHole, MaskImage, MaskPath, MaskRenderer, RendererConfig};
pub use requests::{build_requests, MaskPolicy, MaskRequest, PurposeTuning};
