use crate::tracking::model::MaskDiagnostics;
use std::collections::VecDeque;

pub const DEFAULT_DIAGNOSTICS_WINDOW: usize = 90;
pub const DEFAULT_BITMAP_WARN_RATIO: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Vector,
    Bitmap,
}

/// Frame counters per mask representation plus a rolling window used to
/// surface sustained bitmap fallback.
#[derive(Debug, Clone)]
pub struct RenderDiagnostics {
    window_size: usize,
    warn_ratio: f64,
    recent: VecDeque<RenderMode>,
    recent_bitmaps: usize,
    vector_frames: u64,
    bitmap_frames: u64,
    warning_active: bool,
    warnings_emitted: u64,
}

impl Default for RenderDiagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTICS_WINDOW, DEFAULT_BITMAP_WARN_RATIO)
    }
}

impl RenderDiagnostics {
    pub fn new(window_size: usize, warn_ratio: f64) -> Self {
        let window_size = window_size.max(DEFAULT_DIAGNOSTICS_WINDOW);
        Self {
            window_size,
            warn_ratio: warn_ratio.clamp(0.0, 1.0),
            recent: VecDeque::with_capacity(window_size),
            recent_bitmaps: 0,
            vector_frames: 0,
            bitmap_frames: 0,
            warning_active: false,
            warnings_emitted: 0,
        }
    }

    pub fn record(&mut self, mode: RenderMode) {
        match mode {
            RenderMode::Vector => self.vector_frames = self.vector_frames.saturating_add(1),
            RenderMode::Bitmap => {
                self.bitmap_frames = self.bitmap_frames.saturating_add(1);
                self.recent_bitmaps += 1;
            }
        }
        self.recent.push_back(mode);
        while self.recent.len() > self.window_size {
            if self.recent.pop_front() == Some(RenderMode::Bitmap) {
                self.recent_bitmaps -= 1;
            }
        }
        self.check_fallback_pressure();
    }

    fn check_fallback_pressure(&mut self) {
        if self.recent.len() < self.window_size {
            return;
        }
        let ratio = self.bitmap_ratio();
        if ratio > self.warn_ratio {
            if !self.warning_active {
                self.warning_active = true;
                self.warnings_emitted += 1;
                tracing::warn!(
                    bitmap_ratio = ratio,
                    window = self.window_size,
                    bitmap_frames = self.bitmap_frames,
                    "mask renderer is persistently falling back to bitmap mode"
                );
            }
        } else {
            self.warning_active = false;
        }
    }

    /// Share of bitmap frames in the rolling window.
    pub fn bitmap_ratio(&self) -> f64 {
        if self.recent.is_empty() {
            0.0
        } else {
            self.recent_bitmaps as f64 / self.recent.len() as f64
        }
    }

    pub fn warning_active(&self) -> bool {
        self.warning_active
    }

    pub fn warnings_emitted(&self) -> u64 {
        self.warnings_emitted
    }

    pub fn counters(&self) -> MaskDiagnostics {
        MaskDiagnostics {
            vector_frames: self.vector_frames,
            bitmap_frames: self.bitmap_frames,
        }
    }
}
