use crate::geometry::{clamp_corner_radius, compare_rects, Rect};
use crate::tracking::model::{
    ActiveWindowSnapshot, DisplayInfo, DisplayPolicy, MaskRegion, MaskingMode, Purpose,
};

/// A cutout in display-local content space, ready for one render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskRequest {
    pub rect: Rect,
    pub corner_radius: f64,
    pub purpose: Purpose,
}

/// How one purpose grows, shrinks and rounds its cutout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PurposeTuning {
    /// Applied before clipping to the display.
    pub expansion: f64,
    /// Applied after clipping to the display.
    pub shrink: f64,
    pub radius_bias: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskPolicy {
    pub window: PurposeTuning,
    pub application_menu: PurposeTuning,
    pub system_menu: PurposeTuning,
    /// Fraction of the display area at which a cutout is dropped.
    pub max_display_coverage: f64,
}

impl Default for MaskPolicy {
    fn default() -> Self {
        Self {
            window: PurposeTuning {
                expansion: 2.0,
                shrink: 0.0,
                radius_bias: 0.0,
            },
            application_menu: PurposeTuning {
                expansion: 1.0,
                shrink: 0.75,
                radius_bias: -1.0,
            },
            system_menu: PurposeTuning {
                expansion: 0.5,
                shrink: 0.5,
                radius_bias: -1.5,
            },
            max_display_coverage: 0.98,
        }
    }
}

impl MaskPolicy {
    pub fn tuning(&self, purpose: Purpose) -> PurposeTuning {
        match purpose {
            Purpose::ApplicationWindow => self.window,
            Purpose::ApplicationMenu => self.application_menu,
            Purpose::SystemMenu => self.system_menu,
        }
    }
}

fn purpose_rank(purpose: Purpose) -> u8 {
    match purpose {
        Purpose::ApplicationWindow => 0,
        Purpose::ApplicationMenu => 1,
        Purpose::SystemMenu => 2,
    }
}

fn adjusted_radius(base: f64, tuning: PurposeTuning, scale: f64) -> f64 {
    let half_pixel = 0.5 / scale;
    base + tuning.expansion - (tuning.shrink - half_pixel).max(0.0) + tuning.radius_bias
}

fn request_for_region(
    region: &MaskRegion,
    display: &DisplayInfo,
    scale: f64,
    policy: &MaskPolicy,
) -> Option<MaskRequest> {
    if !region.frame.is_valid() || !region.corner_radius.is_finite() {
        return None;
    }
    let tuning = policy.tuning(region.purpose);

    let expanded = region.frame.inset(-tuning.expansion);
    let clipped = expanded.intersection(&display.frame)?;
    let shrunk = clipped.inset(tuning.shrink);
    let local = shrunk
        .offset(-display.frame.x, -display.frame.y)
        .align_to_pixels(scale);

    if !(local.width > 0.0 && local.height > 0.0) {
        return None;
    }
    let display_area = display.content_bounds().area();
    if display_area > 0.0 && local.area() >= display_area * policy.max_display_coverage {
        return None;
    }

    let radius = adjusted_radius(region.corner_radius, tuning, scale);
    Some(MaskRequest {
        rect: local,
        corner_radius: clamp_corner_radius(radius, &local),
        purpose: region.purpose,
    })
}

/// Expands a snapshot into the sorted cutouts for one display.
///
/// Supplementary `ApplicationWindow` regions only survive in
/// [`MaskingMode::AllWindows`]. The result does not depend on the order of
/// the supplementary regions.
pub fn build_requests(
    snapshot: &ActiveWindowSnapshot,
    display: &DisplayInfo,
    display_policy: &DisplayPolicy,
    policy: &MaskPolicy,
) -> Vec<MaskRequest> {
    if display_policy.excluded || !display.frame.is_valid() {
        return Vec::new();
    }
    let scale = if display.scale.is_finite() && display.scale > 0.0 {
        display.scale
    } else {
        1.0
    };

    let primary = snapshot.primary_region();
    let supplementary = snapshot.supplementary_masks().iter().filter(|region| {
        region.purpose.is_menu() || display_policy.masking_mode == MaskingMode::AllWindows
    });

    let mut requests: Vec<MaskRequest> = std::iter::once(&primary)
        .chain(supplementary)
        .filter_map(|region| request_for_region(region, display, scale, policy))
        .collect();

    requests.sort_by(|a, b| {
        compare_rects(&a.rect, &b.rect)
            .then(a.corner_radius.total_cmp(&b.corner_radius))
            .then(purpose_rank(a.purpose).cmp(&purpose_rank(b.purpose)))
    });
    requests
}
