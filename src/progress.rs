//! Persisted progress
//!
//! The host stores this snapshot wherever it likes (browser local storage, a file). Reads
//! are lenient: each field is parsed on its own and a malformed field falls back to its
//! default instead of failing the whole load.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::error::NagError;

/// Number of most recent days listed by [`ProgressSnapshot::leaderboard`]
pub const LEADERBOARD_DAYS: usize = 30;

/// Progress that survives a reload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// User-chosen KPI threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpi_minutes: Option<u32>,
    /// Milestones unlocked in the current cycle
    #[serde(default)]
    pub unlocked_milestones: BTreeSet<String>,
    /// Longest work time recorded per day, in seconds
    #[serde(default)]
    pub work_records: BTreeMap<NaiveDate, u64>,
    /// Milestones unlocked per day
    #[serde(default)]
    pub daily_milestones: BTreeMap<NaiveDate, u32>,
}

impl ProgressSnapshot {
    /// Parse a snapshot, replacing malformed data with defaults
    pub fn from_json_lenient(json: &str) -> Self {
        let value: Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "progress is not valid JSON, starting fresh");
                return Self::default();
            }
        };

        let Value::Object(map) = value else {
            warn!("progress is not a JSON object, starting fresh");
            return Self::default();
        };

        Self {
            kpi_minutes: field::<Option<u32>>(&map, "kpi_minutes").filter(|m| *m > 0),
            unlocked_milestones: field(&map, "unlocked_milestones"),
            work_records: field(&map, "work_records"),
            daily_milestones: field(&map, "daily_milestones"),
        }
    }

    /// Strict parse, for tooling that wants to report problems
    pub fn from_json(json: &str) -> Result<Self, NagError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, NagError> {
        serde_json::to_string(self).map_err(|e| NagError::EncodingError(e.to_string()))
    }

    /// Record work time for a day, keeping the longest value seen
    pub fn record_work(&mut self, date: NaiveDate, seconds: u64) {
        let entry = self.work_records.entry(date).or_insert(0);
        *entry = (*entry).max(seconds);
    }

    /// Count one milestone unlock for a day
    pub fn record_milestone(&mut self, date: NaiveDate) -> u32 {
        let entry = self.daily_milestones.entry(date).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn work_seconds_on(&self, date: NaiveDate) -> u64 {
        self.work_records.get(&date).copied().unwrap_or(0)
    }

    pub fn milestones_on(&self, date: NaiveDate) -> u32 {
        self.daily_milestones.get(&date).copied().unwrap_or(0)
    }

    /// Recorded days, newest first, limited to the last [`LEADERBOARD_DAYS`]
    pub fn leaderboard(&self) -> Vec<(NaiveDate, u64)> {
        self.work_records
            .iter()
            .rev()
            .take(LEADERBOARD_DAYS)
            .map(|(d, s)| (*d, *s))
            .collect()
    }
}

fn field<T: DeserializeOwned + Default>(map: &serde_json::Map<String, Value>, key: &str) -> T {
    match map.get(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!(field = key, error = %e, "ignoring malformed progress field");
            T::default()
        }),
    }
}
