use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned rectangle in points. `y` grows upward in render space and
/// downward in window-enumeration space; the type itself does not care.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_edges(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.width * self.height
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Finite with strictly positive extent.
    pub fn is_valid(&self) -> bool {
        self.is_finite() && !self.is_empty()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min_x = self.min_x().max(other.min_x());
        let min_y = self.min_y().max(other.min_y());
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        if max_x <= min_x || max_y <= min_y {
            return None;
        }
        Some(Rect::from_edges(min_x, min_y, max_x, max_y))
    }

    pub fn intersection_area(&self, other: &Rect) -> f64 {
        self.intersection(other).map(|r| r.area()).unwrap_or(0.0)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_edges(
            self.min_x().min(other.min_x()),
            self.min_y().min(other.min_y()),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }

    /// Positive `amount` shrinks, negative grows.
    pub fn inset(&self, amount: f64) -> Rect {
        Rect::new(
            self.x + amount,
            self.y + amount,
            self.width - amount * 2.0,
            self.height - amount * 2.0,
        )
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x()
            && point.x < self.max_x()
            && point.y >= self.min_y()
            && point.y < self.max_y()
    }

    /// Snap outward to whole device pixels at `scale`.
    pub fn align_to_pixels(&self, scale: f64) -> Rect {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        // Absorb float noise so 100.0000001 does not round out a full pixel.
        const EPS: f64 = 1e-6;
        let min_x = (self.min_x() * scale + EPS).floor() / scale;
        let min_y = (self.min_y() * scale + EPS).floor() / scale;
        let max_x = (self.max_x() * scale - EPS).ceil() / scale;
        let max_y = (self.max_y() * scale - EPS).ceil() / scale;
        Rect::from_edges(min_x, min_y, max_x, max_y)
    }

    pub fn approx_eq(&self, other: &Rect, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }

    pub fn max_corner_radius(&self) -> f64 {
        (self.width.min(self.height) / 2.0).max(0.0)
    }
}

/// Orders rects by (y, x, width, height).
pub fn compare_rects(a: &Rect, b: &Rect) -> std::cmp::Ordering {
    a.y.total_cmp(&b.y)
        .then(a.x.total_cmp(&b.x))
        .then(a.width.total_cmp(&b.width))
        .then(a.height.total_cmp(&b.height))
}

pub fn clamp_corner_radius(radius: f64, rect: &Rect) -> f64 {
    if !radius.is_finite() {
        return 0.0;
    }
    radius.clamp(0.0, rect.max_corner_radius())
}

/// Point-in-rounded-rect test used by both mask representations.
pub fn rounded_rect_contains(rect: &Rect, radius: f64, point: Point) -> bool {
    if !rect.contains(point) {
        return false;
    }
    let radius = clamp_corner_radius(radius, rect);
    if radius <= 0.0 {
        return true;
    }
    let cx = point.x.clamp(rect.min_x() + radius, rect.max_x() - radius);
    let cy = point.y.clamp(rect.min_y() + radius, rect.max_y() - radius);
    point.distance_to(Point::new(cx, cy)) <= radius
}
