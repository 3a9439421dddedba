//! Capture gating
//!
//! Frames from the landmark producer arrive asynchronously and may keep arriving after the
//! camera was switched off. Every frame carries the [`CaptureToken`] it was started with;
//! stopping capture bumps the generation so late frames are recognized and dropped.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MAX_DURATION_MS;
use crate::error::NagError;

/// Proof that a frame belongs to the current capture run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureToken {
    generation: u64,
}

impl CaptureToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Off,
    On,
    /// The landmark library is missing; terminal for the session
    Unavailable,
}

/// Enable/disable state of the capture pipeline
#[derive(Debug, Clone)]
pub struct CaptureGate {
    state: CaptureState,
    generation: u64,
}

impl Default for CaptureGate {
    fn default() -> Self {
        Self {
            state: CaptureState::Off,
            generation: 0,
        }
    }
}

impl CaptureGate {
    /// Start capturing. Starting while already on returns the live token.
    pub fn start(&mut self) -> Result<CaptureToken, NagError> {
        match self.state {
            CaptureState::Unavailable => Err(NagError::CaptureUnavailable),
            CaptureState::On => Ok(self.token()),
            CaptureState::Off => {
                self.generation += 1;
                self.state = CaptureState::On;
                debug!(generation = self.generation, "capture started");
                Ok(self.token())
            }
        }
    }

    /// Stop capturing. Returns false if capture was not running.
    pub fn stop(&mut self) -> bool {
        if self.state != CaptureState::On {
            return false;
        }
        self.state = CaptureState::Off;
        // Invalidate every token handed out for the finished run
        self.generation += 1;
        debug!(generation = self.generation, "capture stopped");
        true
    }

    /// Mark the landmark library as missing. Returns true if capture was running.
    pub fn mark_unavailable(&mut self) -> bool {
        let was_on = self.state == CaptureState::On;
        if self.state != CaptureState::Unavailable {
            warn!("landmark capture unavailable, detector disabled for this session");
        }
        self.state = CaptureState::Unavailable;
        self.generation += 1;
        was_on
    }

    /// True when the token belongs to the running capture
    pub fn admits(&self, token: &CaptureToken) -> bool {
        self.state == CaptureState::On && token.generation == self.generation
    }

    /// The token of the running capture, if any
    pub fn current(&self) -> Option<CaptureToken> {
        (self.state == CaptureState::On).then(|| self.token())
    }

    pub fn is_on(&self) -> bool {
        self.state == CaptureState::On
    }

    pub fn is_unavailable(&self) -> bool {
        self.state == CaptureState::Unavailable
    }

    fn token(&self) -> CaptureToken {
        CaptureToken {
            generation: self.generation,
        }
    }
}

/// Soft rate cap: frames closer than `min_interval` to the last admitted one are dropped
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    last_admitted: Option<DateTime<Utc>>,
}

impl FrameThrottle {
    pub fn new(min_interval_ms: i64) -> Self {
        Self {
            min_interval: Duration::milliseconds(min_interval_ms.clamp(0, MAX_DURATION_MS)),
            last_admitted: None,
        }
    }

    pub fn admit(&mut self, now: DateTime<Utc>) -> bool {
        match self.last_admitted {
            Some(last) if now - last < self.min_interval => false,
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_admitted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn test_stop_invalidates_token() {
        let mut gate = CaptureGate::default();
        let token = gate.start().unwrap();
        assert!(gate.admits(&token));

        assert!(gate.stop());
        assert!(!gate.admits(&token));

        let restarted = gate.start().unwrap();
        assert!(gate.admits(&restarted));
        assert!(!gate.admits(&token));
    }

    #[test]
    fn test_start_stop_idempotent() {
        let mut gate = CaptureGate::default();
        let a = gate.start().unwrap();
        let b = gate.start().unwrap();
        assert_eq!(a, b);
        assert!(gate.stop());
        assert!(!gate.stop());
        assert!(gate.current().is_none());
    }

    #[test]
    fn test_unavailable_is_terminal() {
        let mut gate = CaptureGate::default();
        let token = gate.start().unwrap();
        assert!(gate.mark_unavailable());
        assert!(!gate.admits(&token));
        assert!(matches!(gate.start(), Err(NagError::CaptureUnavailable)));
        assert!(!gate.stop());
    }

    #[test]
    fn test_throttle_drops_early_frames() {
        let mut throttle = FrameThrottle::new(120);
        let admitted: Vec<i64> = (0..10)
            .map(|i| i * 50)
            .filter(|ms| throttle.admit(t(*ms)))
            .collect();
        assert_eq!(admitted, vec![0, 150, 300, 450]);
    }

    #[test]
    fn test_throttle_reset() {
        let mut throttle = FrameThrottle::new(1000);
        assert!(throttle.admit(t(0)));
        assert!(!throttle.admit(t(10)));
        throttle.reset();
        assert!(throttle.admit(t(20)));
    }
}
