use crate::mask::{MaskPolicy, PurposeTuning, RendererConfig};
use crate::tracking::controller::{ControllerConfig, PredictionConfig};
use crate::tracking::model::{
    DisplayId, MaskingMode, TrackingPolicy, TrackingProfile, TrackingProfileKind,
};
use crate::tracking::predictor::PredictorConfig;
use crate::tracking::resolver::{fallback_corner_radius, ResolverConfig};
use crate::tracking::scheduler::InteractionTiming;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PurposeSettings {
    pub expansion: f64,
    pub shrink: f64,
    pub radius_bias: f64,
}

impl From<PurposeSettings> for PurposeTuning {
    fn from(value: PurposeSettings) -> Self {
        PurposeTuning {
            expansion: value.expansion.max(0.0),
            shrink: value.shrink.max(0.0),
            radius_bias: value.radius_bias,
        }
    }
}

fn default_window_tuning() -> PurposeSettings {
    PurposeSettings {
        expansion: 2.0,
        shrink: 0.0,
        radius_bias: 0.0,
    }
}

fn default_application_menu_tuning() -> PurposeSettings {
    PurposeSettings {
        expansion: 1.0,
        shrink: 0.75,
        radius_bias: -1.0,
    }
}

fn default_system_menu_tuning() -> PurposeSettings {
    PurposeSettings {
        expansion: 0.5,
        shrink: 0.5,
        radius_bias: -1.5,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    #[serde(default)]
    pub tracking_profile: TrackingProfileKind,
    #[serde(default)]
    pub default_masking_mode: MaskingMode,
    /// Masking mode per display id, overriding `default_masking_mode`.
    #[serde(default)]
    pub display_modes: HashMap<u32, MaskingMode>,
    #[serde(default)]
    pub excluded_displays: Vec<u32>,
    #[serde(default = "default_true")]
    pub keep_menu_bar_visible: bool,

    #[serde(default = "default_boost_duration_ms")]
    pub boost_duration_ms: u64,
    #[serde(default = "default_cooldown_duration_ms")]
    pub cooldown_duration_ms: u64,
    #[serde(default = "default_max_fast_frame_rate_hz")]
    pub max_fast_frame_rate_hz: f64,

    #[serde(default = "default_snapshot_tolerance")]
    pub snapshot_tolerance: f64,
    #[serde(default = "default_fast_path_tolerance")]
    pub fast_path_tolerance: f64,

    #[serde(default = "default_prediction_min_center_delta")]
    pub prediction_min_center_delta: f64,
    #[serde(default = "default_prediction_min_size_delta")]
    pub prediction_min_size_delta: f64,
    #[serde(default = "default_prediction_lead_frames")]
    pub prediction_lead_frames: f64,
    #[serde(default = "default_predictor_max_samples")]
    pub predictor_max_samples: usize,
    #[serde(default = "default_predictor_max_age_ms")]
    pub predictor_max_age_ms: u64,
    #[serde(default = "default_predictor_high_refresh_boost")]
    pub predictor_high_refresh_boost: f64,

    #[serde(default = "default_window_tuning")]
    pub window_tuning: PurposeSettings,
    #[serde(default = "default_application_menu_tuning")]
    pub application_menu_tuning: PurposeSettings,
    #[serde(default = "default_system_menu_tuning")]
    pub system_menu_tuning: PurposeSettings,
    #[serde(default = "default_max_display_coverage")]
    pub max_display_coverage: f64,

    #[serde(default = "default_min_overlap_device_pixels")]
    pub min_overlap_device_pixels: f64,
    #[serde(default = "default_overlap_ratio")]
    pub overlap_ratio: f64,
    #[serde(default = "default_dedup_tolerance")]
    pub dedup_tolerance: f64,
    #[serde(default = "default_diagnostics_window")]
    pub diagnostics_window: usize,
    #[serde(default = "default_bitmap_warn_ratio")]
    pub bitmap_warn_ratio: f64,

    /// Overrides the OS-version based fallback corner radius.
    #[serde(default)]
    pub fallback_corner_radius: Option<f64>,
    #[serde(default = "default_menu_corner_radius")]
    pub menu_corner_radius: f64,

    /// When enabled the logger starts at debug level and honours `RUST_LOG`.
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_boost_duration_ms() -> u64 {
    600
}

fn default_cooldown_duration_ms() -> u64 {
    250
}

fn default_max_fast_frame_rate_hz() -> f64 {
    75.0
}

fn default_snapshot_tolerance() -> f64 {
    0.5
}

fn default_fast_path_tolerance() -> f64 {
    0.25
}

fn default_prediction_min_center_delta() -> f64 {
    0.75
}

fn default_prediction_min_size_delta() -> f64 {
    0.5
}

fn default_prediction_lead_frames() -> f64 {
    1.0
}

fn default_predictor_max_samples() -> usize {
    5
}

fn default_predictor_max_age_ms() -> u64 {
    200
}

fn default_predictor_high_refresh_boost() -> f64 {
    0.5
}

fn default_max_display_coverage() -> f64 {
    0.98
}

fn default_min_overlap_device_pixels() -> f64 {
    4.0
}

fn default_overlap_ratio() -> f64 {
    0.5
}

fn default_dedup_tolerance() -> f64 {
    0.5
}

fn default_diagnostics_window() -> usize {
    90
}

fn default_bitmap_warn_ratio() -> f64 {
    0.35
}

fn default_menu_corner_radius() -> f64 {
    6.0
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            tracking_profile: TrackingProfileKind::Standard,
            default_masking_mode: MaskingMode::FocusedWindow,
            display_modes: HashMap::new(),
            excluded_displays: Vec::new(),
            keep_menu_bar_visible: true,
            boost_duration_ms: default_boost_duration_ms(),
            cooldown_duration_ms: default_cooldown_duration_ms(),
            max_fast_frame_rate_hz: default_max_fast_frame_rate_hz(),
            snapshot_tolerance: default_snapshot_tolerance(),
            fast_path_tolerance: default_fast_path_tolerance(),
            prediction_min_center_delta: default_prediction_min_center_delta(),
            prediction_min_size_delta: default_prediction_min_size_delta(),
            prediction_lead_frames: default_prediction_lead_frames(),
            predictor_max_samples: default_predictor_max_samples(),
            predictor_max_age_ms: default_predictor_max_age_ms(),
            predictor_high_refresh_boost: default_predictor_high_refresh_boost(),
            window_tuning: default_window_tuning(),
            application_menu_tuning: default_application_menu_tuning(),
            system_menu_tuning: default_system_menu_tuning(),
            max_display_coverage: default_max_display_coverage(),
            min_overlap_device_pixels: default_min_overlap_device_pixels(),
            overlap_ratio: default_overlap_ratio(),
            dedup_tolerance: default_dedup_tolerance(),
            diagnostics_window: default_diagnostics_window(),
            bitmap_warn_ratio: default_bitmap_warn_ratio(),
            fallback_corner_radius: None,
            menu_corner_radius: default_menu_corner_radius(),
            debug_logging: false,
            log_file: None,
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl TrackerSettings {
    /// Missing or empty files yield the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("parse tracker settings from {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("write tracker settings to {}", path.display()))?;
        Ok(())
    }

    pub fn tracking_policy(&self) -> TrackingPolicy {
        TrackingPolicy {
            default_mode: self.default_masking_mode,
            mode_overrides: self
                .display_modes
                .iter()
                .map(|(id, mode)| (DisplayId(*id), *mode))
                .collect(),
            excluded_displays: self.excluded_displays.iter().copied().map(DisplayId).collect(),
            keep_menu_bar_visible: self.keep_menu_bar_visible,
        }
    }

    pub fn interaction_timing(&self) -> InteractionTiming {
        InteractionTiming {
            boost_duration: Duration::from_millis(self.boost_duration_ms),
            cooldown_duration: Duration::from_millis(
                self.cooldown_duration_ms.min(self.boost_duration_ms),
            ),
            max_fast_frame_rate_hz: finite_or(
                self.max_fast_frame_rate_hz,
                default_max_fast_frame_rate_hz(),
            )
            .max(0.0),
        }
    }

    pub fn mask_policy(&self) -> MaskPolicy {
        MaskPolicy {
            window: self.window_tuning.into(),
            application_menu: self.application_menu_tuning.into(),
            system_menu: self.system_menu_tuning.into(),
            max_display_coverage: finite_or(
                self.max_display_coverage,
                default_max_display_coverage(),
            )
            .clamp(0.0, 1.0),
        }
    }

    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            min_overlap_device_pixels: finite_or(
                self.min_overlap_device_pixels,
                default_min_overlap_device_pixels(),
            )
            .max(0.0),
            overlap_ratio: finite_or(self.overlap_ratio, default_overlap_ratio()).clamp(0.0, 1.0),
            dedup_tolerance: finite_or(self.dedup_tolerance, default_dedup_tolerance()).max(0.0),
            diagnostics_window: self.diagnostics_window,
            bitmap_warn_ratio: finite_or(self.bitmap_warn_ratio, default_bitmap_warn_ratio())
                .clamp(0.0, 1.0),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            profile: TrackingProfile::for_kind(self.tracking_profile),
            timing: self.interaction_timing(),
            snapshot_tolerance: finite_or(self.snapshot_tolerance, default_snapshot_tolerance())
                .max(0.0),
            fast_path_tolerance: finite_or(
                self.fast_path_tolerance,
                default_fast_path_tolerance(),
            )
            .max(0.0),
            prediction: PredictionConfig {
                min_center_delta: finite_or(
                    self.prediction_min_center_delta,
                    default_prediction_min_center_delta(),
                ),
                min_size_delta: finite_or(
                    self.prediction_min_size_delta,
                    default_prediction_min_size_delta(),
                ),
                lead_frames: finite_or(
                    self.prediction_lead_frames,
                    default_prediction_lead_frames(),
                )
                .clamp(0.0, 4.0),
            },
            predictor: PredictorConfig {
                max_samples: self.predictor_max_samples,
                max_age: Duration::from_millis(self.predictor_max_age_ms),
                high_refresh_boost: finite_or(
                    self.predictor_high_refresh_boost,
                    default_predictor_high_refresh_boost(),
                )
                .max(0.0),
            },
            mask_policy: self.mask_policy(),
            renderer: self.renderer_config(),
        }
    }

    pub fn resolver_config(&self, os_major: u32) -> ResolverConfig {
        ResolverConfig {
            fallback_corner_radius: self
                .fallback_corner_radius
                .filter(|radius| radius.is_finite() && *radius >= 0.0)
                .unwrap_or_else(|| fallback_corner_radius(os_major)),
            menu_corner_radius: finite_or(self.menu_corner_radius, default_menu_corner_radius())
                .max(0.0),
            ..ResolverConfig::default()
        }
    }
}
