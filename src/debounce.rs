//! Signal debouncing
//!
//! Converts noisy per-frame observations into discrete events. Eyes and mouth use
//! consecutive-frame counters that fire on the frame the run length is reached (edge
//! triggered). The wave detector keeps a trailing window of wrist x positions and looks
//! for enough spread and direction reversals.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::debug;

use crate::config::{NagConfig, MAX_DURATION_MS};
use crate::geometry::{face_metrics, WRIST};
use crate::types::LandmarkPoint;

/// Discrete outcome of one face frame for the eye signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeSignal {
    /// No usable face in the frame
    NoFace,
    /// Eyes at or above the threshold
    Open,
    /// Below threshold, run not yet confirmed or already confirmed earlier
    Closing,
    /// Run length reached on this exact frame
    Closed,
}

/// Debounced result of a face frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceOutcome {
    pub eyes: EyeSignal,
    /// True only on the frame where the open-mouth run length is reached
    pub mouth_open: bool,
    /// Mean eye aspect ratio, when a face was measured
    pub ear: Option<f64>,
    /// Mouth aspect ratio, when a face was measured
    pub mar: Option<f64>,
}

/// One wrist sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveSample {
    pub x: f64,
    pub t: DateTime<Utc>,
}

/// Trailing window of wrist samples
#[derive(Debug, Clone)]
pub struct WaveWindow {
    samples: VecDeque<WaveSample>,
    span: Duration,
}

impl WaveWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            span,
        }
    }

    /// Append a sample and drop everything older than `now - span`
    pub fn push(&mut self, x: f64, now: DateTime<Utc>) {
        self.samples.push_back(WaveSample { x, t: now });
        // Near the start of the representable range nothing can be older than the span
        if let Some(cutoff) = now.checked_sub_signed(self.span) {
            self.samples.retain(|s| s.t >= cutoff);
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &WaveSample> {
        self.samples.iter()
    }

    /// Horizontal extent of the window
    pub fn spread(&self) -> f64 {
        let (min, max) = self
            .samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.x), hi.max(s.x))
            });
        if self.samples.is_empty() {
            0.0
        } else {
            max - min
        }
    }

    /// Sign changes between consecutive deltas. Zero deltas are skipped.
    pub fn reversals(&self) -> u32 {
        let xs: Vec<f64> = self.samples.iter().map(|s| s.x).collect();
        xs.windows(3)
            .filter(|w| {
                let v1 = w[1] - w[0];
                let v2 = w[2] - w[1];
                (v1 > 0.0 && v2 < 0.0) || (v1 < 0.0 && v2 > 0.0)
            })
            .count() as u32
    }
}

fn bounded_ms(ms: i64) -> Duration {
    Duration::milliseconds(ms.clamp(0, MAX_DURATION_MS))
}

/// Per-signal debounce state for one capture session
#[derive(Debug, Clone)]
pub struct SignalDebouncer {
    ear_threshold: f64,
    eye_closed_frames: u32,
    mar_threshold: f64,
    mouth_open_frames: u32,
    wave_min_samples: usize,
    wave_min_spread: f64,
    wave_min_reversals: u32,
    wave_cooldown: Duration,

    eye_closed_count: u32,
    mouth_open_count: u32,
    wave: WaveWindow,
    wave_cooldown_until: Option<DateTime<Utc>>,
}

impl Default for SignalDebouncer {
    fn default() -> Self {
        Self::new(&NagConfig::default())
    }
}

impl SignalDebouncer {
    pub fn new(config: &NagConfig) -> Self {
        Self {
            ear_threshold: config.ear_threshold,
            eye_closed_frames: config.eye_closed_frames,
            mar_threshold: config.mar_threshold,
            mouth_open_frames: config.mouth_open_frames,
            wave_min_samples: config.wave_min_samples,
            wave_min_spread: config.wave_min_spread,
            wave_min_reversals: config.wave_min_reversals,
            wave_cooldown: bounded_ms(config.wave_cooldown_ms),
            eye_closed_count: 0,
            mouth_open_count: 0,
            wave: WaveWindow::new(bounded_ms(config.wave_window_ms)),
            wave_cooldown_until: None,
        }
    }

    /// Process the face landmarks of one frame (first face only)
    pub fn observe_face(&mut self, faces: &[Vec<LandmarkPoint>]) -> FaceOutcome {
        let metrics = faces.first().and_then(|landmarks| face_metrics(landmarks));

        let Some(metrics) = metrics else {
            self.eye_closed_count = 0;
            self.mouth_open_count = 0;
            return FaceOutcome {
                eyes: EyeSignal::NoFace,
                mouth_open: false,
                ear: None,
                mar: None,
            };
        };

        let eyes = self.observe_ear(metrics.ear);
        let mouth_open = self.observe_mar(metrics.mar);

        FaceOutcome {
            eyes,
            mouth_open,
            ear: Some(metrics.ear),
            mar: Some(metrics.mar),
        }
    }

    /// Feed one eye aspect ratio sample
    pub fn observe_ear(&mut self, ear: f64) -> EyeSignal {
        if ear < self.ear_threshold {
            self.eye_closed_count = self.eye_closed_count.saturating_add(1);
            if self.eye_closed_count == self.eye_closed_frames {
                debug!(ear, frames = self.eye_closed_count, "eyes closed confirmed");
                EyeSignal::Closed
            } else {
                EyeSignal::Closing
            }
        } else {
            self.eye_closed_count = 0;
            EyeSignal::Open
        }
    }

    /// Feed one mouth aspect ratio sample; true on the confirming frame
    pub fn observe_mar(&mut self, mar: f64) -> bool {
        if mar > self.mar_threshold {
            self.mouth_open_count = self.mouth_open_count.saturating_add(1);
            let confirmed = self.mouth_open_count == self.mouth_open_frames;
            if confirmed {
                debug!(mar, frames = self.mouth_open_count, "mouth open confirmed");
            }
            confirmed
        } else {
            self.mouth_open_count = 0;
            false
        }
    }

    /// Process the hand landmarks of one frame; true when a wave is classified
    pub fn observe_hands(&mut self, hands: &[Vec<LandmarkPoint>], now: DateTime<Utc>) -> bool {
        if self.in_wave_cooldown(now) {
            return false;
        }

        let Some(wrist) = hands.first().and_then(|hand| hand.get(WRIST)) else {
            self.wave.clear();
            return false;
        };

        self.observe_wrist(wrist.x, now)
    }

    /// Feed one wrist x position; true when a wave is classified
    pub fn observe_wrist(&mut self, x: f64, now: DateTime<Utc>) -> bool {
        if self.in_wave_cooldown(now) {
            return false;
        }

        self.wave.push(x, now);
        if self.wave.len() < self.wave_min_samples {
            return false;
        }
        let spread = self.wave.spread();
        if spread < self.wave_min_spread {
            return false;
        }
        let reversals = self.wave.reversals();
        if reversals < self.wave_min_reversals {
            return false;
        }

        debug!(spread, reversals, "wave detected");
        let until = now
            .checked_add_signed(self.wave_cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.wave_cooldown_until = Some(until);
        self.wave.clear();
        true
    }

    pub fn in_wave_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.wave_cooldown_until.is_some_and(|until| now < until)
    }

    pub fn eye_closed_count(&self) -> u32 {
        self.eye_closed_count
    }

    pub fn mouth_open_count(&self) -> u32 {
        self.mouth_open_count
    }

    pub fn wave_window(&self) -> &WaveWindow {
        &self.wave
    }

    /// Drop all counters, samples and the wave cooldown
    pub fn reset(&mut self) {
        self.eye_closed_count = 0;
        self.mouth_open_count = 0;
        self.wave.clear();
        self.wave_cooldown_until = None;
    }
}
