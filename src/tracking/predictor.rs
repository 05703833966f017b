use crate::geometry::Rect;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const REFERENCE_REFRESH: Duration = Duration::from_nanos(16_666_667);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictorConfig {
    pub max_samples: usize,
    pub max_age: Duration,
    /// Extra lead applied at the highest refresh rates, as a fraction.
    pub high_refresh_boost: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            max_samples: 5,
            max_age: Duration::from_millis(200),
            high_refresh_boost: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    frame: Rect,
    at: Instant,
}

/// Linear extrapolation over a short history of observed frames.
#[derive(Debug, Clone)]
pub struct MotionPredictor {
    config: PredictorConfig,
    samples: VecDeque<Sample>,
    refresh_period: Option<Duration>,
}

impl Default for MotionPredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl MotionPredictor {
    pub fn new(config: PredictorConfig) -> Self {
        let max_samples = config.max_samples.max(2);
        Self {
            config: PredictorConfig {
                max_samples,
                ..config
            },
            samples: VecDeque::with_capacity(max_samples),
            refresh_period: None,
        }
    }

    pub fn record(&mut self, frame: Rect, at: Instant) {
        if !frame.is_valid() {
            return;
        }
        if let Some(last) = self.samples.back() {
            // Out-of-order samples would produce a negative time span.
            if at < last.at {
                self.samples.clear();
            }
        }
        self.samples.push_back(Sample { frame, at });
        while self.samples.len() > self.config.max_samples {
            self.samples.pop_front();
        }
        self.prune(at);
    }

    fn prune(&mut self, now: Instant) {
        while let Some(first) = self.samples.front() {
            if now.saturating_duration_since(first.at) > self.config.max_age {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn set_refresh_period(&mut self, period: Duration) {
        if !period.is_zero() {
            self.refresh_period = Some(period);
        }
    }

    pub fn refresh_period(&self) -> Option<Duration> {
        self.refresh_period
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn last_observed(&self) -> Option<Rect> {
        self.samples.back().map(|sample| sample.frame)
    }

    /// Grows as the refresh period shrinks below 60 Hz, capped at
    /// `1 + high_refresh_boost`.
    pub fn lead_multiplier(&self) -> f64 {
        let Some(period) = self.refresh_period else {
            return 1.0;
        };
        let ratio = REFERENCE_REFRESH.as_secs_f64() / period.as_secs_f64();
        1.0 + self.config.high_refresh_boost * (ratio - 1.0).clamp(0.0, 1.0)
    }

    pub fn predict(&self, lead: Duration) -> Option<Rect> {
        if lead.is_zero() || self.samples.len() < 2 {
            return None;
        }
        let first = self.samples.front()?;
        let last = self.samples.back()?;
        let span = last.at.saturating_duration_since(first.at).as_secs_f64();
        if span <= 0.0 {
            return None;
        }

        let from = first.frame.center();
        let to = last.frame.center();
        let vx = (to.x - from.x) / span;
        let vy = (to.y - from.y) / span;
        let vw = (last.frame.width - first.frame.width) / span;
        let vh = (last.frame.height - first.frame.height) / span;

        let t = lead.as_secs_f64() * self.lead_multiplier();
        let width = last.frame.width + vw * t;
        let height = last.frame.height + vh * t;
        let cx = to.x + vx * t;
        let cy = to.y + vy * t;
        let predicted = Rect::new(cx - width / 2.0, cy - height / 2.0, width, height);
        predicted.is_valid().then_some(predicted)
    }
}

/// Whether `predicted` differs enough from `observed` to be worth applying.
pub fn is_meaningful_shift(
    observed: &Rect,
    predicted: &Rect,
    min_center_delta: f64,
    min_size_delta: f64,
) -> bool {
    let center_shift = observed.center().distance_to(predicted.center());
    let size_shift = (observed.width - predicted.width)
        .abs()
        .max((observed.height - predicted.height).abs());
    center_shift >= min_center_delta || size_shift >= min_size_delta
}
