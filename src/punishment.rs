//! Punishment state machine
//!
//! Punishment is active while at least one reason is held. Entry and exit side effects
//! run once per transition, never once per reason.

use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

use crate::types::PunishmentReason;

/// Side effects run on state transitions (warning spawner, audio, ...)
pub trait PunishmentHooks {
    /// Idle → Punishing. `reason` is the reason that caused the transition.
    fn on_enter(&mut self, _reason: &PunishmentReason) {}

    /// Punishing → Idle
    fn on_exit(&mut self) {}
}

/// Hooks that do nothing; the session reports transitions as events instead
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PunishmentHooks for NoopHooks {}

/// A state change caused by `trigger` or `clear`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Entered(PunishmentReason),
    Exited,
}

pub struct PunishmentMachine {
    reasons: BTreeSet<PunishmentReason>,
    paused: bool,
    hooks: Box<dyn PunishmentHooks>,
}

impl fmt::Debug for PunishmentMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PunishmentMachine")
            .field("reasons", &self.reasons)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}

impl Default for PunishmentMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PunishmentMachine {
    pub fn new() -> Self {
        Self::with_hooks(Box::new(NoopHooks))
    }

    pub fn with_hooks(hooks: Box<dyn PunishmentHooks>) -> Self {
        Self {
            reasons: BTreeSet::new(),
            paused: false,
            hooks,
        }
    }

    /// Add a reason. No-op while paused or when the reason is already held.
    pub fn trigger(&mut self, reason: PunishmentReason) -> Option<Transition> {
        if self.paused || self.reasons.contains(&reason) {
            return None;
        }

        let was_idle = self.reasons.is_empty();
        self.reasons.insert(reason.clone());
        if !was_idle {
            return None;
        }

        info!(%reason, "punishment started");
        self.hooks.on_enter(&reason);
        Some(Transition::Entered(reason))
    }

    /// Remove one reason, or every reason when `reason` is `None`
    pub fn clear(&mut self, reason: Option<&PunishmentReason>) -> Option<Transition> {
        if self.reasons.is_empty() {
            return None;
        }

        match reason {
            Some(reason) => {
                self.reasons.remove(reason);
            }
            None => self.reasons.clear(),
        }

        if !self.reasons.is_empty() {
            return None;
        }

        info!("punishment ended");
        self.hooks.on_exit();
        Some(Transition::Exited)
    }

    /// Clear every reason
    pub fn clear_all(&mut self) -> Option<Transition> {
        self.clear(None)
    }

    /// Pausing drops every reason and blocks new ones until resumed
    pub fn set_paused(&mut self, paused: bool) -> Option<Transition> {
        self.paused = paused;
        if paused {
            self.clear_all()
        } else {
            None
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_punishing(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn has_reason(&self, reason: &PunishmentReason) -> bool {
        self.reasons.contains(reason)
    }

    pub fn reasons(&self) -> impl Iterator<Item = &PunishmentReason> {
        self.reasons.iter()
    }
}
