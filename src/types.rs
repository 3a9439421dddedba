//! Core data types for nagwatch
//!
//! These types flow between the landmark producer, the session and the host UI.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single landmark in normalized image-space units ([0, 1] on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    /// Depth as reported by the producer. Ignored by every computation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl LandmarkPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }
}

/// One face-mesh result: zero or more faces, each an ordered landmark sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceFrame {
    /// When the frame was processed
    pub timestamp: DateTime<Utc>,
    /// Detected faces (only the first one is used)
    #[serde(default)]
    pub faces: Vec<Vec<LandmarkPoint>>,
}

/// One hand-tracking result: zero or more hands, wrist at index 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandFrame {
    /// When the frame was processed
    pub timestamp: DateTime<Utc>,
    /// Detected hands (only the wrist of the first one is used)
    #[serde(default)]
    pub hands: Vec<Vec<LandmarkPoint>>,
}

/// Cause that holds the punishment state active
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunishmentReason {
    /// No activity for longer than the inactivity limit
    Idle,
    /// Eyes closed for a debounced run of frames
    Eyes,
    /// Host-defined reason
    #[serde(untagged)]
    Other(String),
}

impl PunishmentReason {
    pub fn as_str(&self) -> &str {
        match self {
            PunishmentReason::Idle => "idle",
            PunishmentReason::Eyes => "eyes",
            PunishmentReason::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for PunishmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timer status reported on every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Resting,
    Working,
    Warning,
}

impl WorkStatus {
    pub fn label(&self) -> &'static str {
        match self {
            WorkStatus::Resting => "RESTING",
            WorkStatus::Working => "WORKING",
            WorkStatus::Warning => "IDLE!",
        }
    }
}

/// Camera/detector status shown next to the camera toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    On,
    Off,
    Unavailable,
    Blocked,
    NoFace,
    EyesOpen,
    EyesClosed,
    MouthOpenCleared,
    WaveDetected,
}

impl CameraStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CameraStatus::On => "Camera on",
            CameraStatus::Off => "Camera off",
            CameraStatus::Unavailable => "Camera lib missing",
            CameraStatus::Blocked => "Camera blocked",
            CameraStatus::NoFace => "No face",
            CameraStatus::EyesOpen => "Eyes open",
            CameraStatus::EyesClosed => "Eyes closed",
            CameraStatus::MouthOpenCleared => "Mouth open - Warning cleared",
            CameraStatus::WaveDetected => "Wave detected",
        }
    }
}

/// Events emitted by a session for the host UI to render and persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NagEvent {
    /// Camera/detector status changed
    Camera { status: CameraStatus, label: String },
    /// Punishment became active (first reason added)
    PunishmentStarted { reason: PunishmentReason },
    /// Punishment ended (last reason cleared)
    PunishmentEnded,
    /// One logical second elapsed
    Tick {
        status: WorkStatus,
        total_work_seconds: u64,
        display: String,
    },
    /// A KPI crossing unlocked a milestone
    MilestoneUnlocked {
        milestone: String,
        unlocked_count: usize,
        cycle_reset: bool,
    },
    /// Work time for a day should be persisted (emitted on restart)
    WorkRecorded { date: NaiveDate, seconds: u64 },
}

impl NagEvent {
    pub fn camera(status: CameraStatus) -> Self {
        NagEvent::Camera {
            status,
            label: status.label().to_string(),
        }
    }
}

/// Envelope stamped on replayed events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Session instance identifier
    pub session_id: String,
    /// Timestamp of the input that produced the event
    pub at: DateTime<Utc>,
    /// The event itself
    #[serde(flatten)]
    pub event: NagEvent,
}
