//! Session configuration
//!
//! Every field has a default, so a partial JSON document (or `{}`) is a valid config.

use crate::error::NagError;
use serde::{Deserialize, Serialize};

/// Seconds without activity before the idle reason triggers
pub const DEFAULT_INACTIVITY_LIMIT_SECS: u64 = 20;

/// Default KPI threshold in minutes
pub const DEFAULT_KPI_MINUTES: u32 = 30;

/// Eye aspect ratio below which a frame counts as "eyes closed"
pub const EAR_THRESHOLD: f64 = 0.21;

/// Consecutive closed-eye frames required to confirm closure
pub const EYE_CLOSED_FRAMES: u32 = 12;

/// Mouth aspect ratio above which a frame counts as "mouth open"
pub const MAR_THRESHOLD: f64 = 0.5;

/// Consecutive open-mouth frames required to confirm
pub const MOUTH_OPEN_FRAMES: u32 = 5;

/// Trailing window of wrist samples considered for a wave
pub const WAVE_WINDOW_MS: i64 = 1200;

/// Minimum samples in the window before a wave can be classified
pub const WAVE_MIN_SAMPLES: usize = 6;

/// Minimum horizontal wrist spread (normalized units)
pub const WAVE_MIN_SPREAD: f64 = 0.18;

/// Minimum direction reversals in the window
pub const WAVE_MIN_REVERSALS: u32 = 2;

/// Wave evaluation is suppressed for this long after a detection
pub const WAVE_COOLDOWN_MS: i64 = 2000;

/// Minimum spacing between processed face frames (~8 Hz)
pub const FACE_FRAME_INTERVAL_MS: i64 = 120;

/// Minimum spacing between processed hand frames (~5 Hz)
pub const HAND_FRAME_INTERVAL_MS: i64 = 180;

/// Interval of the recurring warning effect while punished
pub const WARNING_INTERVAL_MS: u64 = 300;

/// Upper bound for every configured window, cooldown and interval (one day)
pub const MAX_DURATION_MS: i64 = 86_400_000;

/// Upper bound for the inactivity limit (one day)
pub const MAX_INACTIVITY_LIMIT_SECS: u64 = 86_400;

/// Tunables for a nag session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NagConfig {
    pub inactivity_limit_secs: u64,
    pub kpi_minutes: u32,
    pub ear_threshold: f64,
    pub eye_closed_frames: u32,
    pub mar_threshold: f64,
    pub mouth_open_frames: u32,
    pub wave_window_ms: i64,
    pub wave_min_samples: usize,
    pub wave_min_spread: f64,
    pub wave_min_reversals: u32,
    pub wave_cooldown_ms: i64,
    pub face_frame_interval_ms: i64,
    pub hand_frame_interval_ms: i64,
    /// Not used by the core; forwarded to the host's warning spawner
    pub warning_interval_ms: u64,
    /// Seed for milestone draws. Entropy-seeded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_seed: Option<u64>,
}

impl Default for NagConfig {
    fn default() -> Self {
        Self {
            inactivity_limit_secs: DEFAULT_INACTIVITY_LIMIT_SECS,
            kpi_minutes: DEFAULT_KPI_MINUTES,
            ear_threshold: EAR_THRESHOLD,
            eye_closed_frames: EYE_CLOSED_FRAMES,
            mar_threshold: MAR_THRESHOLD,
            mouth_open_frames: MOUTH_OPEN_FRAMES,
            wave_window_ms: WAVE_WINDOW_MS,
            wave_min_samples: WAVE_MIN_SAMPLES,
            wave_min_spread: WAVE_MIN_SPREAD,
            wave_min_reversals: WAVE_MIN_REVERSALS,
            wave_cooldown_ms: WAVE_COOLDOWN_MS,
            face_frame_interval_ms: FACE_FRAME_INTERVAL_MS,
            hand_frame_interval_ms: HAND_FRAME_INTERVAL_MS,
            warning_interval_ms: WARNING_INTERVAL_MS,
            milestone_seed: None,
        }
    }
}

impl NagConfig {
    /// Parse and validate a config from JSON
    pub fn from_json(json: &str) -> Result<Self, NagError> {
        let config: NagConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to JSON
    pub fn to_json(&self) -> Result<String, NagError> {
        serde_json::to_string_pretty(self).map_err(|e| NagError::EncodingError(e.to_string()))
    }

    /// Reject values that would make a detector never or always fire
    pub fn validate(&self) -> Result<(), NagError> {
        if self.kpi_minutes == 0 {
            return Err(NagError::InvalidThreshold(0));
        }
        if self.inactivity_limit_secs == 0
            || self.inactivity_limit_secs > MAX_INACTIVITY_LIMIT_SECS
        {
            return Err(NagError::InvalidConfig(format!(
                "inactivity_limit_secs must be in 1..={MAX_INACTIVITY_LIMIT_SECS}, got {}",
                self.inactivity_limit_secs
            )));
        }
        if self.eye_closed_frames == 0 || self.mouth_open_frames == 0 {
            return Err(NagError::InvalidConfig(
                "debounce frame counts must be positive".to_string(),
            ));
        }
        if !(self.ear_threshold.is_finite() && self.ear_threshold > 0.0) {
            return Err(NagError::InvalidConfig(format!(
                "ear_threshold must be a positive number, got {}",
                self.ear_threshold
            )));
        }
        if !(self.mar_threshold.is_finite() && self.mar_threshold > 0.0) {
            return Err(NagError::InvalidConfig(format!(
                "mar_threshold must be a positive number, got {}",
                self.mar_threshold
            )));
        }
        if self.wave_window_ms <= 0 || self.wave_cooldown_ms < 0 {
            return Err(NagError::InvalidConfig(
                "wave window must be positive and cooldown non-negative".to_string(),
            ));
        }
        if self.wave_window_ms > MAX_DURATION_MS || self.wave_cooldown_ms > MAX_DURATION_MS {
            return Err(NagError::InvalidConfig(format!(
                "wave window and cooldown must not exceed {MAX_DURATION_MS} ms"
            )));
        }
        if self.wave_min_samples < 3 {
            // Reversals need at least two consecutive deltas
            return Err(NagError::InvalidConfig(
                "wave_min_samples must be at least 3".to_string(),
            ));
        }
        let frame_range = 0..=MAX_DURATION_MS;
        if !frame_range.contains(&self.face_frame_interval_ms)
            || !frame_range.contains(&self.hand_frame_interval_ms)
        {
            return Err(NagError::InvalidConfig(format!(
                "frame intervals must be in 0..={MAX_DURATION_MS} ms"
            )));
        }
        Ok(())
    }
}
