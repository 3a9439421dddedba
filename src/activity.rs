//! Idle clock and work-time accrual
//!
//! The tracker shares the punishing and paused state with the punishment machine, so the
//! transitions take the machine by mutable reference instead of holding it.

use chrono::{DateTime, Duration, Utc};

use crate::config::MAX_INACTIVITY_LIMIT_SECS;
use crate::punishment::{PunishmentMachine, Transition};
use crate::types::{PunishmentReason, WorkStatus};

/// Result of one logical second
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub status: WorkStatus,
    pub total_work_seconds: u64,
    /// Whether this tick credited a work second
    pub credited: bool,
    /// Idle time as of this tick
    pub idle: Duration,
}

#[derive(Debug, Clone)]
pub struct ActivityTracker {
    last_activity_at: DateTime<Utc>,
    inactivity_limit: Duration,
    total_work_seconds: u64,
}

impl ActivityTracker {
    pub fn new(now: DateTime<Utc>, inactivity_limit_secs: u64) -> Self {
        Self {
            last_activity_at: now,
            inactivity_limit: Duration::seconds(
                inactivity_limit_secs.min(MAX_INACTIVITY_LIMIT_SECS) as i64,
            ),
            total_work_seconds: 0,
        }
    }

    /// Advance one second: accrue work time when neither paused nor punished.
    ///
    /// The idle check is left to [`ActivityTracker::check_idle`] so callers can run the
    /// KPI check in between, in the same order as the host timer.
    pub fn tick(&mut self, now: DateTime<Utc>, machine: &PunishmentMachine) -> TickOutcome {
        if machine.is_paused() {
            self.last_activity_at = now;
            return TickOutcome {
                status: WorkStatus::Resting,
                total_work_seconds: self.total_work_seconds,
                credited: false,
                idle: Duration::zero(),
            };
        }

        let idle = now - self.last_activity_at;
        if machine.is_punishing() {
            return TickOutcome {
                status: WorkStatus::Warning,
                total_work_seconds: self.total_work_seconds,
                credited: false,
                idle,
            };
        }

        self.total_work_seconds += 1;
        TickOutcome {
            status: WorkStatus::Working,
            total_work_seconds: self.total_work_seconds,
            credited: true,
            idle,
        }
    }

    /// Trigger the idle reason once the inactivity limit is reached
    pub fn check_idle(
        &self,
        now: DateTime<Utc>,
        machine: &mut PunishmentMachine,
    ) -> Option<Transition> {
        if machine.is_paused() || now - self.last_activity_at < self.inactivity_limit {
            return None;
        }
        machine.trigger(PunishmentReason::Idle)
    }

    /// Pointer move, key press or pointer down. Ignored while paused.
    pub fn record_activity(
        &mut self,
        now: DateTime<Utc>,
        machine: &mut PunishmentMachine,
    ) -> Option<Transition> {
        if machine.is_paused() {
            return None;
        }
        self.last_activity_at = now;
        machine.clear(Some(&PunishmentReason::Idle))
    }

    /// Reset the idle baseline without touching punishment state
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    /// Zero the work counter and return the seconds it held
    pub fn restart(&mut self, now: DateTime<Utc>) -> u64 {
        self.last_activity_at = now;
        std::mem::take(&mut self.total_work_seconds)
    }

    /// Restore a previously persisted counter
    pub fn set_total_work_seconds(&mut self, seconds: u64) {
        self.total_work_seconds = seconds;
    }

    pub fn total_work_seconds(&self) -> u64 {
        self.total_work_seconds
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_activity_at
    }
}

/// Render work time as `MM:SS`. Minutes keep counting past 59.
pub fn format_work_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
