use crate::geometry::{clamp_corner_radius, rounded_rect_contains, Point, Rect};
use crate::mask::diagnostics::{
    RenderDiagnostics, RenderMode, DEFAULT_BITMAP_WARN_RATIO, DEFAULT_DIAGNOSTICS_WINDOW,
};
use crate::mask::requests::MaskRequest;
use crate::tracking::model::MaskDiagnostics;
use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use std::path::Path;

pub const COVERED: u8 = 255;
pub const UNCOVERED: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskHole {
    pub rect: Rect,
    pub corner_radius: f64,
}

impl MaskHole {
    fn contains(&self, point: Point) -> bool {
        rounded_rect_contains(&self.rect, self.corner_radius, point)
    }
}

/// Display bounds with rounded holes subtracted.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskPath {
    pub bounds: Rect,
    pub scale: f64,
    pub holes: Vec<MaskHole>,
    pub fill_rule: FillRule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaskBitmap {
    pub bounds: Rect,
    pub scale: f64,
    /// One byte per device pixel, row 0 at content `y = bounds.y`.
    pub pixels: GrayImage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaskImage {
    Vector(MaskPath),
    Bitmap(MaskBitmap),
}

impl MaskImage {
    pub fn full_coverage(bounds: Rect, scale: f64) -> Self {
        MaskImage::Vector(MaskPath {
            bounds,
            scale,
            holes: Vec::new(),
            fill_rule: FillRule::EvenOdd,
        })
    }

    pub fn is_bitmap(&self) -> bool {
        matches!(self, MaskImage::Bitmap(_))
    }

    pub fn bounds(&self) -> Rect {
        match self {
            MaskImage::Vector(path) => path.bounds,
            MaskImage::Bitmap(bitmap) => bitmap.bounds,
        }
    }

    /// Whether the overlay paints at `point` (content space).
    pub fn coverage_at(&self, point: Point) -> bool {
        match self {
            MaskImage::Vector(path) => {
                if !path.bounds.contains(point) {
                    return false;
                }
                let inside = path.holes.iter().filter(|hole| hole.contains(point)).count();
                inside % 2 == 0
            }
            MaskImage::Bitmap(bitmap) => {
                if !bitmap.bounds.contains(point) {
                    return false;
                }
                let px = ((point.x - bitmap.bounds.x) * bitmap.scale).floor();
                let py = ((point.y - bitmap.bounds.y) * bitmap.scale).floor();
                if px < 0.0 || py < 0.0 {
                    return false;
                }
                let (px, py) = (px as u32, py as u32);
                if px >= bitmap.pixels.width() || py >= bitmap.pixels.height() {
                    return false;
                }
                bitmap.pixels.get_pixel(px, py).0[0] == COVERED
            }
        }
    }

    /// Rasterizes either representation at its own scale.
    pub fn to_pixels(&self) -> GrayImage {
        match self {
            MaskImage::Bitmap(bitmap) => bitmap.pixels.clone(),
            MaskImage::Vector(path) => {
                let mut pixels = covered_canvas(path.bounds, path.scale);
                let (width, height) = pixels.dimensions();
                for py in 0..height {
                    for px in 0..width {
                        let centre = pixel_centre(path.bounds, path.scale, px, py);
                        let inside = path.holes.iter().filter(|hole| hole.contains(centre)).count();
                        if inside % 2 == 1 {
                            pixels.put_pixel(px, py, Luma([UNCOVERED]));
                        }
                    }
                }
                pixels
            }
        }
    }

    pub fn write_png(&self, path: &Path) -> Result<()> {
        self.to_pixels()
            .save(path)
            .with_context(|| format!("writing mask to {}", path.display()))
    }
}

fn pixel_dimensions(bounds: Rect, scale: f64) -> (u32, u32) {
    let width = (bounds.width * scale).ceil().max(0.0);
    let height = (bounds.height * scale).ceil().max(0.0);
    (width as u32, height as u32)
}

fn covered_canvas(bounds: Rect, scale: f64) -> GrayImage {
    let (width, height) = pixel_dimensions(bounds, scale);
    GrayImage::from_pixel(width, height, Luma([COVERED]))
}

fn pixel_centre(bounds: Rect, scale: f64, px: u32, py: u32) -> Point {
    Point::new(
        bounds.x + (px as f64 + 0.5) / scale,
        bounds.y + (py as f64 + 0.5) / scale,
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererConfig {
    /// Overlaps at or below this many device pixels are noise.
    pub min_overlap_device_pixels: f64,
    /// Share of the smaller hole an overlap must reach to force bitmap mode.
    pub overlap_ratio: f64,
    /// Holes whose edges all lie within this many points are one hole.
    pub dedup_tolerance: f64,
    pub diagnostics_window: usize,
    pub bitmap_warn_ratio: f64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            min_overlap_device_pixels: 4.0,
            overlap_ratio: 0.5,
            dedup_tolerance: 0.5,
            diagnostics_window: DEFAULT_DIAGNOSTICS_WINDOW,
            bitmap_warn_ratio: DEFAULT_BITMAP_WARN_RATIO,
        }
    }
}

/// Per-display renderer. Keeps the last mask so callers can hand out a
/// reference without copying pixels.
#[derive(Debug, Clone)]
pub struct MaskRenderer {
    config: RendererConfig,
    image: MaskImage,
    diagnostics: RenderDiagnostics,
}

impl Default for MaskRenderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl MaskRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            image: MaskImage::full_coverage(Rect::ZERO, 1.0),
            diagnostics: RenderDiagnostics::new(
                config.diagnostics_window,
                config.bitmap_warn_ratio,
            ),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn image(&self) -> &MaskImage {
        &self.image
    }

    pub fn diagnostics(&self) -> MaskDiagnostics {
        self.diagnostics.counters()
    }

    pub fn render_diagnostics(&self) -> &RenderDiagnostics {
        &self.diagnostics
    }

    /// Back to a fully covered mask over the last bounds. Counters are kept.
    pub fn reset(&mut self) {
        let (bounds, scale) = match &self.image {
            MaskImage::Vector(path) => (path.bounds, path.scale),
            MaskImage::Bitmap(bitmap) => (bitmap.bounds, bitmap.scale),
        };
        self.image = MaskImage::full_coverage(bounds, scale);
    }

    pub fn render(
        &mut self,
        bounds: Rect,
        scale: f64,
        static_rects: &[Rect],
        dynamic: &[MaskRequest],
    ) -> &MaskImage {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        let holes = self.collect_holes(static_rects, dynamic);

        let mode = if self.needs_bitmap(&holes, scale) {
            RenderMode::Bitmap
        } else {
            RenderMode::Vector
        };
        tracing::trace!(holes = holes.len(), ?mode, "rendering mask");

        self.image = match mode {
            RenderMode::Vector => MaskImage::Vector(MaskPath {
                bounds,
                scale,
                holes,
                fill_rule: FillRule::EvenOdd,
            }),
            RenderMode::Bitmap => MaskImage::Bitmap(rasterize_union(bounds, scale, &holes)),
        };
        self.diagnostics.record(mode);
        &self.image
    }

    fn collect_holes(&self, static_rects: &[Rect], dynamic: &[MaskRequest]) -> Vec<MaskHole> {
        let candidates = static_rects
            .iter()
            .map(|rect| MaskHole {
                rect: *rect,
                corner_radius: 0.0,
            })
            .chain(dynamic.iter().map(|request| MaskHole {
                rect: request.rect,
                corner_radius: request.corner_radius,
            }))
            .filter(|hole| hole.rect.is_valid());

        let tolerance = self.config.dedup_tolerance;
        let mut holes: Vec<MaskHole> = Vec::new();
        for candidate in candidates {
            match holes
                .iter_mut()
                .find(|hole| hole.rect.approx_eq(&candidate.rect, tolerance))
            {
                Some(existing) => {
                    let rect = existing.rect.union(&candidate.rect);
                    let radius = existing.corner_radius.max(candidate.corner_radius);
                    existing.rect = rect;
                    existing.corner_radius = clamp_corner_radius(radius, &rect);
                }
                None => holes.push(MaskHole {
                    rect: candidate.rect,
                    corner_radius: clamp_corner_radius(candidate.corner_radius, &candidate.rect),
                }),
            }
        }
        holes
    }

    fn needs_bitmap(&self, holes: &[MaskHole], scale: f64) -> bool {
        let min_area_points = self.config.min_overlap_device_pixels / (scale * scale);
        holes.iter().enumerate().any(|(index, a)| {
            holes[index + 1..].iter().any(|b| {
                let overlap = a.rect.intersection_area(&b.rect);
                let smaller = a.rect.area().min(b.rect.area());
                overlap > min_area_points
                    && smaller > 0.0
                    && overlap >= smaller * self.config.overlap_ratio
            })
        })
    }
}

fn rasterize_union(bounds: Rect, scale: f64, holes: &[MaskHole]) -> MaskBitmap {
    let mut pixels = covered_canvas(bounds, scale);
    let (width, height) = pixels.dimensions();
    for hole in holes {
        let Some(visible) = hole.rect.intersection(&bounds) else {
            continue;
        };
        let x0 = ((visible.min_x() - bounds.x) * scale).floor().max(0.0) as u32;
        let y0 = ((visible.min_y() - bounds.y) * scale).floor().max(0.0) as u32;
        let x1 = (((visible.max_x() - bounds.x) * scale).ceil().max(0.0) as u32).min(width);
        let y1 = (((visible.max_y() - bounds.y) * scale).ceil().max(0.0) as u32).min(height);
        for py in y0..y1 {
            for px in x0..x1 {
                if hole.contains(pixel_centre(bounds, scale, px, py)) {
                    pixels.put_pixel(px, py, Luma([UNCOVERED]));
                }
            }
        }
    }
    MaskBitmap {
        bounds,
        scale,
        pixels,
    }
}
