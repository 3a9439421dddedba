//! nagwatch.input.v1 schema
//!
//! The host-to-core input stream. Each record is one JSON object tagged by `kind`, so a
//! recorded session can be stored as NDJSON and replayed deterministically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NagError;
use crate::types::{FaceFrame, HandFrame, LandmarkPoint};

/// Current input schema version
pub const INPUT_SCHEMA_VERSION: &str = "nagwatch.input.v1";

/// Kind of user activity that resets the idle clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PointerMove,
    KeyPress,
    PointerDown,
}

/// One input record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionInput {
    /// Face-mesh result
    FaceFrame {
        timestamp: DateTime<Utc>,
        #[serde(default)]
        faces: Vec<Vec<LandmarkPoint>>,
    },
    /// Hand-tracking result
    HandFrame {
        timestamp: DateTime<Utc>,
        #[serde(default)]
        hands: Vec<Vec<LandmarkPoint>>,
    },
    /// Pointer or keyboard activity
    Activity {
        timestamp: DateTime<Utc>,
        #[serde(default = "default_activity")]
        activity: ActivityKind,
    },
    /// One logical second of the session clock
    Tick { timestamp: DateTime<Utc> },
    /// Pause button pressed
    Pause { timestamp: DateTime<Utc> },
    /// Resume button pressed
    Resume { timestamp: DateTime<Utc> },
    /// Restart the work timer
    Restart { timestamp: DateTime<Utc> },
    /// Change the KPI threshold
    SetKpi {
        timestamp: DateTime<Utc>,
        minutes: u32,
    },
    /// Camera switched on
    CaptureStart { timestamp: DateTime<Utc> },
    /// Camera switched off
    CaptureStop { timestamp: DateTime<Utc> },
    /// The landmark library could not be loaded
    CaptureUnavailable { timestamp: DateTime<Utc> },
    /// Camera permission denied
    CaptureBlocked { timestamp: DateTime<Utc> },
    /// The milestone animation finished
    MilestoneFinished { timestamp: DateTime<Utc> },
}

fn default_activity() -> ActivityKind {
    ActivityKind::PointerMove
}

impl SessionInput {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SessionInput::FaceFrame { timestamp, .. }
            | SessionInput::HandFrame { timestamp, .. }
            | SessionInput::Activity { timestamp, .. }
            | SessionInput::Tick { timestamp }
            | SessionInput::Pause { timestamp }
            | SessionInput::Resume { timestamp }
            | SessionInput::Restart { timestamp }
            | SessionInput::SetKpi { timestamp, .. }
            | SessionInput::CaptureStart { timestamp }
            | SessionInput::CaptureStop { timestamp }
            | SessionInput::CaptureUnavailable { timestamp }
            | SessionInput::CaptureBlocked { timestamp }
            | SessionInput::MilestoneFinished { timestamp } => *timestamp,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SessionInput::FaceFrame { .. } => "face_frame",
            SessionInput::HandFrame { .. } => "hand_frame",
            SessionInput::Activity { .. } => "activity",
            SessionInput::Tick { .. } => "tick",
            SessionInput::Pause { .. } => "pause",
            SessionInput::Resume { .. } => "resume",
            SessionInput::Restart { .. } => "restart",
            SessionInput::SetKpi { .. } => "set_kpi",
            SessionInput::CaptureStart { .. } => "capture_start",
            SessionInput::CaptureStop { .. } => "capture_stop",
            SessionInput::CaptureUnavailable { .. } => "capture_unavailable",
            SessionInput::CaptureBlocked { .. } => "capture_blocked",
            SessionInput::MilestoneFinished { .. } => "milestone_finished",
        }
    }

    /// Check constraints serde cannot express
    pub fn validate(&self) -> Result<(), NagError> {
        match self {
            SessionInput::SetKpi { minutes: 0, .. } => Err(NagError::InvalidThreshold(0)),
            SessionInput::FaceFrame { faces, .. } => check_points(faces.iter().flatten()),
            SessionInput::HandFrame { hands, .. } => check_points(hands.iter().flatten()),
            _ => Ok(()),
        }
    }

    pub fn into_face_frame(self) -> Option<FaceFrame> {
        match self {
            SessionInput::FaceFrame { timestamp, faces } => Some(FaceFrame { timestamp, faces }),
            _ => None,
        }
    }

    pub fn into_hand_frame(self) -> Option<HandFrame> {
        match self {
            SessionInput::HandFrame { timestamp, hands } => Some(HandFrame { timestamp, hands }),
            _ => None,
        }
    }
}

fn check_points<'a, I: Iterator<Item = &'a LandmarkPoint>>(mut points: I) -> Result<(), NagError> {
    match points.find(|p| !(p.x.is_finite() && p.y.is_finite())) {
        Some(p) => Err(NagError::ParseError(format!(
            "non-finite landmark coordinate ({}, {})",
            p.x, p.y
        ))),
        None => Ok(()),
    }
}

/// One record that failed parsing or validation
#[derive(Debug)]
pub struct InputIssue {
    /// Zero-based line (NDJSON) or element (array) index
    pub index: usize,
    pub error: NagError,
}

/// Parser for recorded input streams
pub struct InputReader;

impl InputReader {
    /// Parse NDJSON, skipping blank lines
    pub fn parse_ndjson(data: &str) -> Result<Vec<SessionInput>, NagError> {
        data.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line.trim())
                    .map_err(|e| NagError::ParseError(format!("line {}: {}", i + 1, e)))
            })
            .collect()
    }

    /// Parse a JSON array of records
    pub fn parse_array(data: &str) -> Result<Vec<SessionInput>, NagError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Parse NDJSON without stopping at the first bad line
    pub fn scan_ndjson(data: &str) -> (Vec<SessionInput>, Vec<InputIssue>) {
        let mut inputs = Vec::new();
        let mut issues = Vec::new();

        for (index, line) in data.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<SessionInput>(trimmed)
                .map_err(NagError::from)
                .and_then(|input| input.validate().map(|_| input));
            match parsed {
                Ok(input) => inputs.push(input),
                Err(error) => issues.push(InputIssue { index, error }),
            }
        }

        (inputs, issues)
    }

    /// Validate already-parsed records, returning the failures
    pub fn validate_inputs(inputs: &[SessionInput]) -> Vec<InputIssue> {
        let mut issues: Vec<InputIssue> = inputs
            .iter()
            .enumerate()
            .filter_map(|(index, input)| {
                input.validate().err().map(|error| InputIssue { index, error })
            })
            .collect();

        let out_of_order = inputs
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[1].timestamp() < pair[0].timestamp())
            .map(|(i, pair)| InputIssue {
                index: i + 1,
                error: NagError::ParseError(format!(
                    "timestamp {} is earlier than the previous record",
                    pair[1].timestamp().to_rfc3339()
                )),
            });
        issues.extend(out_of_order);
        issues.sort_by_key(|issue| issue.index);
        issues
    }
}
