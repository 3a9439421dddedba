//! Nag session
//!
//! One `NagSession` holds every piece of detector, timer and milestone state for a page
//! lifetime. The host feeds it frames, activity, ticks and control commands and renders
//! the returned events.
//!
//! Inputs are applied in the same order the widget's timer and capture callbacks run:
//! tick (status → credit → KPI → idle), face frame (eyes → mouth), hand frame (wave).

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activity::{format_work_time, ActivityTracker};
use crate::capture::{CaptureGate, CaptureToken, FrameThrottle};
use crate::config::NagConfig;
use crate::debounce::{EyeSignal, SignalDebouncer};
use crate::error::NagError;
use crate::input::SessionInput;
use crate::milestone::{KpiTracker, MilestoneCatalog};
use crate::progress::ProgressSnapshot;
use crate::punishment::{PunishmentHooks, PunishmentMachine, Transition};
use crate::types::{
    CameraStatus, FaceFrame, HandFrame, NagEvent, PunishmentReason, WorkStatus,
};

/// Timer display while punished
const WARNING_DISPLAY: &str = "!!!!";

pub struct NagSession {
    id: Uuid,
    config: NagConfig,
    debouncer: SignalDebouncer,
    punishment: PunishmentMachine,
    activity: ActivityTracker,
    kpi: KpiTracker,
    catalog: MilestoneCatalog,
    capture: CaptureGate,
    face_throttle: FrameThrottle,
    hand_throttle: FrameThrottle,
    camera_status: CameraStatus,
    progress: ProgressSnapshot,
    rng: StdRng,
}

impl NagSession {
    /// Create a session whose idle clock starts at `now`
    pub fn new(config: NagConfig, now: DateTime<Utc>) -> Result<Self, NagError> {
        Self::build(config, now, PunishmentMachine::new())
    }

    /// Create a session that runs `hooks` on punishment transitions
    pub fn with_hooks(
        config: NagConfig,
        now: DateTime<Utc>,
        hooks: Box<dyn PunishmentHooks>,
    ) -> Result<Self, NagError> {
        Self::build(config, now, PunishmentMachine::with_hooks(hooks))
    }

    fn build(
        config: NagConfig,
        now: DateTime<Utc>,
        punishment: PunishmentMachine,
    ) -> Result<Self, NagError> {
        config.validate()?;

        let rng = match config.milestone_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let session = Self {
            id: Uuid::new_v4(),
            debouncer: SignalDebouncer::new(&config),
            punishment,
            activity: ActivityTracker::new(now, config.inactivity_limit_secs),
            kpi: KpiTracker::new(config.kpi_minutes)?,
            catalog: MilestoneCatalog::default(),
            capture: CaptureGate::default(),
            face_throttle: FrameThrottle::new(config.face_frame_interval_ms),
            hand_throttle: FrameThrottle::new(config.hand_frame_interval_ms),
            camera_status: CameraStatus::Off,
            progress: ProgressSnapshot::default(),
            rng,
            config,
        };
        debug!(session_id = %session.id, "session created");
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Timer
    // ------------------------------------------------------------------

    /// One logical second
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<NagEvent> {
        let mut events = Vec::new();
        let outcome = self.activity.tick(now, &self.punishment);

        let display = match outcome.status {
            WorkStatus::Warning => WARNING_DISPLAY.to_string(),
            _ => format_work_time(outcome.total_work_seconds),
        };
        events.push(NagEvent::Tick {
            status: outcome.status,
            total_work_seconds: outcome.total_work_seconds,
            display,
        });

        if outcome.credited {
            if self.kpi.check(outcome.total_work_seconds) {
                self.launch_milestone(now, &mut events);
            }
            let transition = self.activity.check_idle(now, &mut self.punishment);
            push_transition(&mut events, transition);
        }

        events
    }

    /// Pointer move, key press or pointer down
    pub fn on_activity(&mut self, now: DateTime<Utc>) -> Vec<NagEvent> {
        let mut events = Vec::new();
        let transition = self.activity.record_activity(now, &mut self.punishment);
        push_transition(&mut events, transition);
        events
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Vec<NagEvent> {
        let mut events = Vec::new();
        let transition = self.punishment.set_paused(true);
        self.activity.refresh(now);
        push_transition(&mut events, transition);
        info!("session paused");
        events
    }

    /// Resume after a pause; the idle baseline restarts at `now`
    pub fn resume(&mut self, now: DateTime<Utc>) -> Vec<NagEvent> {
        self.punishment.set_paused(false);
        self.activity.refresh(now);
        info!("session resumed");
        Vec::new()
    }

    /// Zero the work timer, recording the time worked so far for the day.
    ///
    /// The KPI keeps its last recorded crossing, so after a restart the next milestone
    /// waits until the new count passes that minute.
    pub fn restart(&mut self, now: DateTime<Utc>) -> Vec<NagEvent> {
        let mut events = Vec::new();
        let worked = self.activity.restart(now);

        if worked > 0 {
            let date = now.date_naive();
            self.progress.record_work(date, worked);
            events.push(NagEvent::WorkRecorded {
                date,
                seconds: self.progress.work_seconds_on(date),
            });
        }

        let transition = self.punishment.clear_all();
        push_transition(&mut events, transition);
        events
    }

    // ------------------------------------------------------------------
    // Milestones
    // ------------------------------------------------------------------

    /// Change the KPI threshold; minutes already worked do not count toward it
    pub fn set_kpi_minutes(&mut self, minutes: u32) -> Result<(), NagError> {
        self.kpi
            .set_threshold(minutes, self.activity.total_work_seconds())?;
        self.progress.kpi_minutes = Some(minutes);
        info!(minutes, "KPI threshold set");
        Ok(())
    }

    /// The host finished showing the milestone
    pub fn finish_milestone(&mut self) {
        self.kpi.finish();
    }

    fn launch_milestone(&mut self, now: DateTime<Utc>, events: &mut Vec<NagEvent>) {
        let Some(draw) = self.catalog.draw(&mut self.rng) else {
            // Nothing to show, so nothing will call finish_milestone
            self.kpi.finish();
            return;
        };

        self.progress.record_milestone(now.date_naive());
        events.push(NagEvent::MilestoneUnlocked {
            milestone: draw.milestone,
            unlocked_count: draw.unlocked_count,
            cycle_reset: draw.cycle_reset,
        });
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    /// Switch the camera on. Fails once capture has been marked unavailable.
    pub fn start_capture(&mut self) -> Result<(CaptureToken, Vec<NagEvent>), NagError> {
        let token = self.capture.start()?;
        let mut events = Vec::new();
        self.set_camera_status(CameraStatus::On, &mut events);
        Ok((token, events))
    }

    /// Switch the camera off; frames still in flight for the old token are ignored
    pub fn stop_capture(&mut self) -> Vec<NagEvent> {
        let mut events = Vec::new();
        if !self.capture.stop() {
            return events;
        }
        self.reset_detector(&mut events);
        self.set_camera_status(CameraStatus::Off, &mut events);
        events
    }

    /// The landmark library is missing. Terminal for the session's detector.
    pub fn capture_unavailable(&mut self) -> Vec<NagEvent> {
        let mut events = Vec::new();
        self.capture.mark_unavailable();
        self.reset_detector(&mut events);
        self.set_camera_status(CameraStatus::Unavailable, &mut events);
        events
    }

    /// Camera permission denied; capture stays off but may be retried
    pub fn capture_blocked(&mut self) -> Vec<NagEvent> {
        let mut events = Vec::new();
        if self.capture.is_unavailable() {
            return events;
        }
        if self.capture.stop() {
            self.reset_detector(&mut events);
        }
        self.set_camera_status(CameraStatus::Blocked, &mut events);
        events
    }

    fn reset_detector(&mut self, events: &mut Vec<NagEvent>) {
        self.debouncer.reset();
        self.face_throttle.reset();
        self.hand_throttle.reset();
        let transition = self.punishment.clear(Some(&PunishmentReason::Eyes));
        push_transition(events, transition);
    }

    /// Face-mesh result for the capture run identified by `token`
    pub fn on_face_frame(&mut self, token: &CaptureToken, frame: &FaceFrame) -> Vec<NagEvent> {
        let mut events = Vec::new();
        if !self.capture.admits(token) || !self.face_throttle.admit(frame.timestamp) {
            return events;
        }

        let outcome = self.debouncer.observe_face(&frame.faces);
        match outcome.eyes {
            EyeSignal::NoFace => {
                self.set_camera_status(CameraStatus::NoFace, &mut events);
                let transition = self.punishment.clear(Some(&PunishmentReason::Eyes));
                push_transition(&mut events, transition);
            }
            EyeSignal::Open => {
                self.set_camera_status(CameraStatus::EyesOpen, &mut events);
                let transition = self.punishment.clear(Some(&PunishmentReason::Eyes));
                push_transition(&mut events, transition);
            }
            EyeSignal::Closing => {
                self.set_camera_status(CameraStatus::EyesClosed, &mut events);
            }
            EyeSignal::Closed => {
                self.set_camera_status(CameraStatus::EyesClosed, &mut events);
                let transition = self.punishment.trigger(PunishmentReason::Eyes);
                push_transition(&mut events, transition);
            }
        }

        if outcome.mouth_open {
            self.activity.refresh(frame.timestamp);
            if let Some(transition) = self.punishment.clear_all() {
                self.announce(CameraStatus::MouthOpenCleared, &mut events);
                push_transition(&mut events, Some(transition));
            }
        }

        events
    }

    /// Hand-tracking result for the capture run identified by `token`
    pub fn on_hand_frame(&mut self, token: &CaptureToken, frame: &HandFrame) -> Vec<NagEvent> {
        let mut events = Vec::new();
        if !self.capture.admits(token) || !self.hand_throttle.admit(frame.timestamp) {
            return events;
        }

        if self.debouncer.observe_hands(&frame.hands, frame.timestamp) {
            self.announce(CameraStatus::WaveDetected, &mut events);
            let transition = self.punishment.clear_all();
            self.activity.refresh(frame.timestamp);
            push_transition(&mut events, transition);
        }

        events
    }

    /// Report a level status only when it changes
    fn set_camera_status(&mut self, status: CameraStatus, events: &mut Vec<NagEvent>) {
        if self.camera_status != status {
            self.announce(status, events);
        }
    }

    /// Report a status unconditionally
    fn announce(&mut self, status: CameraStatus, events: &mut Vec<NagEvent>) {
        self.camera_status = status;
        events.push(NagEvent::camera(status));
    }

    // ------------------------------------------------------------------
    // Input stream
    // ------------------------------------------------------------------

    /// Apply one recorded input. Frames are attributed to the running capture, if any.
    pub fn apply(&mut self, input: SessionInput) -> Result<Vec<NagEvent>, NagError> {
        input.validate()?;

        let events = match input {
            SessionInput::FaceFrame { timestamp, faces } => match self.capture.current() {
                Some(token) => self.on_face_frame(&token, &FaceFrame { timestamp, faces }),
                None => Vec::new(),
            },
            SessionInput::HandFrame { timestamp, hands } => match self.capture.current() {
                Some(token) => self.on_hand_frame(&token, &HandFrame { timestamp, hands }),
                None => Vec::new(),
            },
            SessionInput::Activity { timestamp, .. } => self.on_activity(timestamp),
            SessionInput::Tick { timestamp } => self.tick(timestamp),
            SessionInput::Pause { timestamp } => self.pause(timestamp),
            SessionInput::Resume { timestamp } => self.resume(timestamp),
            SessionInput::Restart { timestamp } => self.restart(timestamp),
            SessionInput::SetKpi { minutes, .. } => {
                self.set_kpi_minutes(minutes)?;
                Vec::new()
            }
            SessionInput::CaptureStart { .. } => self.start_capture()?.1,
            SessionInput::CaptureStop { .. } => self.stop_capture(),
            SessionInput::CaptureUnavailable { .. } => self.capture_unavailable(),
            SessionInput::CaptureBlocked { .. } => self.capture_blocked(),
            SessionInput::MilestoneFinished { .. } => {
                self.finish_milestone();
                Vec::new()
            }
        };

        Ok(events)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Restore persisted progress. Today's recorded work resumes the timer, and the
    /// milestones it already earned are not awarded again.
    pub fn restore_progress(&mut self, snapshot: ProgressSnapshot, now: DateTime<Utc>) {
        let today_seconds = snapshot.work_seconds_on(now.date_naive());
        self.activity.set_total_work_seconds(today_seconds);

        let threshold = snapshot.kpi_minutes.unwrap_or(self.kpi.threshold_minutes());
        if let Err(e) = self.kpi.set_threshold(threshold, today_seconds) {
            warn!(error = %e, "ignoring persisted KPI threshold");
        }

        self.catalog
            .restore_unlocked(snapshot.unlocked_milestones.iter().cloned());
        self.progress = snapshot;
        debug!(today_seconds, threshold, "progress restored");
    }

    /// Current progress, with today's work time folded in
    pub fn save_progress(&mut self, now: DateTime<Utc>) -> ProgressSnapshot {
        let worked = self.activity.total_work_seconds();
        if worked > 0 {
            self.progress.record_work(now.date_naive(), worked);
        }
        self.progress.kpi_minutes = Some(self.kpi.threshold_minutes());
        self.progress.unlocked_milestones = self.catalog.unlocked().cloned().collect();
        self.progress.clone()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &NagConfig {
        &self.config
    }

    pub fn is_punishing(&self) -> bool {
        self.punishment.is_punishing()
    }

    pub fn is_paused(&self) -> bool {
        self.punishment.is_paused()
    }

    pub fn reasons(&self) -> Vec<PunishmentReason> {
        self.punishment.reasons().cloned().collect()
    }

    pub fn total_work_seconds(&self) -> u64 {
        self.activity.total_work_seconds()
    }

    pub fn kpi_minutes(&self) -> u32 {
        self.kpi.threshold_minutes()
    }

    pub fn camera_status(&self) -> CameraStatus {
        self.camera_status
    }

    pub fn capture_token(&self) -> Option<CaptureToken> {
        self.capture.current()
    }

    pub fn unlocked_milestones(&self) -> usize {
        self.catalog.unlocked_count()
    }

    /// Trigger a host-defined reason (e.g. from an external detector)
    pub fn trigger(&mut self, reason: PunishmentReason) -> Vec<NagEvent> {
        let mut events = Vec::new();
        let transition = self.punishment.trigger(reason);
        push_transition(&mut events, transition);
        events
    }

    /// Clear one reason, or all of them
    pub fn clear(&mut self, reason: Option<&PunishmentReason>) -> Vec<NagEvent> {
        let mut events = Vec::new();
        let transition = self.punishment.clear(reason);
        push_transition(&mut events, transition);
        events
    }
}

fn push_transition(events: &mut Vec<NagEvent>, transition: Option<Transition>) {
    match transition {
        Some(Transition::Entered(reason)) => events.push(NagEvent::PunishmentStarted { reason }),
        Some(Transition::Exited) => events.push(NagEvent::PunishmentEnded),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::fixtures::face;
    use crate::types::LandmarkPoint;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    fn session() -> NagSession {
        let config = NagConfig {
            milestone_seed: Some(7),
            ..NagConfig::default()
        };
        NagSession::new(config, t(0)).unwrap()
    }

    fn face_frame(ms: i64, ear: f64, mar: f64) -> FaceFrame {
        FaceFrame {
            timestamp: t(ms),
            faces: vec![face(ear, mar)],
        }
    }

    fn hand_frame(ms: i64, x: f64) -> HandFrame {
        HandFrame {
            timestamp: t(ms),
            hands: vec![vec![LandmarkPoint::new(x, 0.5); 21]],
        }
    }

    fn started(events: &[NagEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, NagEvent::PunishmentStarted { .. }))
            .count()
    }

    fn ended(events: &[NagEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, NagEvent::PunishmentEnded))
            .count()
    }

    /// Feed closed-eye frames at the face frame rate
    fn close_eyes(session: &mut NagSession, token: &CaptureToken, from_ms: i64, frames: i64) -> Vec<NagEvent> {
        (0..frames)
            .flat_map(|i| session.on_face_frame(token, &face_frame(from_ms + i * 125, 0.1, 0.1)))
            .collect()
    }

    #[test]
    fn test_eyes_closed_triggers_once() {
        let mut session = session();
        let (token, events) = session.start_capture().unwrap();
        assert_eq!(events, vec![NagEvent::camera(CameraStatus::On)]);

        let events = close_eyes(&mut session, &token, 0, 30);
        assert_eq!(started(&events), 1);
        assert_eq!(session.reasons(), vec![PunishmentReason::Eyes]);

        let events = session.on_face_frame(&token, &face_frame(10_000, 0.3, 0.1));
        assert_eq!(ended(&events), 1);
        assert!(events.contains(&NagEvent::camera(CameraStatus::EyesOpen)));
    }

    #[test]
    fn test_eleven_closed_frames_do_not_trigger() {
        let mut session = session();
        let (token, _) = session.start_capture().unwrap();
        let events = close_eyes(&mut session, &token, 0, 11);
        assert_eq!(started(&events), 0);
        assert!(!session.is_punishing());
    }

    #[test]
    fn test_status_reported_on_change_only() {
        let mut session = session();
        let (token, _) = session.start_capture().unwrap();
        let events = close_eyes(&mut session, &token, 0, 5);
        let statuses: Vec<&NagEvent> = events
            .iter()
            .filter(|e| matches!(e, NagEvent::Camera { .. }))
            .collect();
        assert_eq!(statuses, vec![&NagEvent::camera(CameraStatus::EyesClosed)]);
    }

    #[test]
    fn test_no_face_clears_eyes() {
        let mut session = session();
        let (token, _) = session.start_capture().unwrap();
        close_eyes(&mut session, &token, 0, 12);
        assert!(session.is_punishing());

        let events = session.on_face_frame(
            &token,
            &FaceFrame {
                timestamp: t(5_000),
                faces: vec![],
            },
        );
        assert!(events.contains(&NagEvent::camera(CameraStatus::NoFace)));
        assert_eq!(ended(&events), 1);
    }

    #[test]
    fn test_mouth_open_clears_every_reason() {
        let mut session = session();
        let (token, _) = session.start_capture().unwrap();
        session.trigger(PunishmentReason::Idle);
        session.trigger(PunishmentReason::Other("custom".into()));

        let events: Vec<NagEvent> = (0..5)
            .flat_map(|i| session.on_face_frame(&token, &face_frame(i * 125, 0.3, 0.8)))
            .collect();

        assert!(!session.is_punishing());
        assert_eq!(ended(&events), 1);
        assert!(events.contains(&NagEvent::camera(CameraStatus::MouthOpenCleared)));
    }

    #[test]
    fn test_mouth_open_refreshes_idle_clock() {
        let mut session = session();
        let (token, _) = session.start_capture().unwrap();
        for i in 0..5 {
            session.on_face_frame(&token, &face_frame(15_000 + i * 125, 0.3, 0.8));
        }
        // Idle baseline moved to 15.5 s, so 20 s is not yet idle
        for s in 1..=20 {
            session.tick(t(s * 1000));
        }
        assert!(!session.is_punishing());
        session.tick(t(35_500));
        assert!(session.reasons().contains(&PunishmentReason::Idle));
    }

    #[test]
    fn test_wave_clears_and_cools_down() {
        let mut session = session();
        let (token, _) = session.start_capture().unwrap();
        session.trigger(PunishmentReason::Idle);

        let xs = [0.3, 0.5, 0.3, 0.5, 0.3, 0.5];
        let events: Vec<NagEvent> = xs
            .iter()
            .enumerate()
            .flat_map(|(i, x)| session.on_hand_frame(&token, &hand_frame(i as i64 * 180, *x)))
            .collect();

        assert!(events.contains(&NagEvent::camera(CameraStatus::WaveDetected)));
        assert_eq!(ended(&events), 1);

        // Same gesture continuing during the cooldown is ignored
        session.trigger(PunishmentReason::Idle);
        let events: Vec<NagEvent> = xs
            .iter()
            .enumerate()
            .flat_map(|(i, x)| session.on_hand_frame(&token, &hand_frame(1_080 + i as i64 * 180, *x)))
            .collect();
        assert!(events.is_empty());
        assert!(session.is_punishing());
    }

    #[test]
    fn test_frames_faster_than_cap_are_dropped() {
        let mut session = session();
        let (token, _) = session.start_capture().unwrap();
        // 30 fps: only every fourth frame clears the 120 ms cap, so 11 are processed
        for i in 0..44 {
            session.on_face_frame(&token, &face_frame(i * 33, 0.1, 0.1));
        }
        assert!(!session.is_punishing());
    }

    #[test]
    fn test_stale_token_frames_ignored() {
        let mut session = session();
        let (old, _) = session.start_capture().unwrap();
        close_eyes(&mut session, &old, 0, 12);
        assert!(session.is_punishing());

        let events = session.stop_capture();
        assert_eq!(ended(&events), 1);
        assert!(events.contains(&NagEvent::camera(CameraStatus::Off)));

        // Late frames from the stopped stream
        let events = close_eyes(&mut session, &old, 2_000, 20);
        assert!(events.is_empty());

        // A new run does not accept the old token either
        let (new, _) = session.start_capture().unwrap();
        assert_ne!(old, new);
        assert!(close_eyes(&mut session, &old, 5_000, 20).is_empty());
        assert_eq!(started(&close_eyes(&mut session, &new, 8_000, 12)), 1);
    }

    #[test]
    fn test_capture_unavailable_keeps_timer_running() {
        let mut session = session();
        let events = session.capture_unavailable();
        assert_eq!(events, vec![NagEvent::camera(CameraStatus::Unavailable)]);
        assert!(matches!(session.start_capture(), Err(NagError::CaptureUnavailable)));

        session.tick(t(1_000));
        assert_eq!(session.total_work_seconds(), 1);
    }

    #[test]
    fn test_idle_punishment_and_recovery() {
        let mut session = session();
        let mut all = Vec::new();
        for s in 1..=20 {
            all.extend(session.tick(t(s * 1000)));
        }
        assert_eq!(
            all.last(),
            Some(&NagEvent::PunishmentStarted {
                reason: PunishmentReason::Idle
            })
        );

        let events = session.tick(t(21_000));
        assert_eq!(
            events,
            vec![NagEvent::Tick {
                status: WorkStatus::Warning,
                total_work_seconds: 20,
                display: "!!!!".to_string(),
            }]
        );

        let events = session.on_activity(t(21_500));
        assert_eq!(events, vec![NagEvent::PunishmentEnded]);
        let events = session.tick(t(22_000));
        assert!(matches!(
            events[0],
            NagEvent::Tick {
                status: WorkStatus::Working,
                total_work_seconds: 21,
                ..
            }
        ));
    }

    #[test]
    fn test_pause_freezes_idle_clock() {
        let mut session = session();
        session.pause(t(0));

        for hours in 1..=5 {
            let events = session.tick(t(hours * 3_600_000));
            assert!(matches!(
                events[0],
                NagEvent::Tick {
                    status: WorkStatus::Resting,
                    ..
                }
            ));
            assert_eq!(events.len(), 1);
        }
        // Activity while paused does nothing
        assert!(session.on_activity(t(18_000_001)).is_empty());

        session.resume(t(20_000_000));
        session.tick(t(20_001_000));
        assert!(!session.is_punishing());
        assert_eq!(session.total_work_seconds(), 1);
    }

    #[test]
    fn test_pause_clears_punishment_and_blocks_eyes() {
        let mut session = session();
        let (token, _) = session.start_capture().unwrap();
        session.trigger(PunishmentReason::Idle);
        let events = session.pause(t(100));
        assert_eq!(events, vec![NagEvent::PunishmentEnded]);

        let events = close_eyes(&mut session, &token, 200, 20);
        assert_eq!(started(&events), 0);
        assert!(session.is_paused());
    }

    #[test]
    fn test_milestone_unlocks_on_kpi() {
        let config = NagConfig {
            kpi_minutes: 1,
            inactivity_limit_secs: 10_000,
            milestone_seed: Some(3),
            ..NagConfig::default()
        };
        let mut session = NagSession::new(config, t(0)).unwrap();

        let mut unlocked = Vec::new();
        for s in 1..=125 {
            for event in session.tick(t(s * 1000)) {
                if let NagEvent::MilestoneUnlocked { unlocked_count, .. } = event {
                    unlocked.push((s, unlocked_count));
                    session.finish_milestone();
                }
            }
        }
        assert_eq!(unlocked, vec![(60, 1), (120, 2)]);

        let progress = session.save_progress(t(125_000));
        assert_eq!(progress.milestones_on(t(0).date_naive()), 2);
        assert_eq!(progress.unlocked_milestones.len(), 2);
    }

    #[test]
    fn test_milestone_not_finished_blocks_next() {
        let config = NagConfig {
            kpi_minutes: 1,
            inactivity_limit_secs: 10_000,
            milestone_seed: Some(3),
            ..NagConfig::default()
        };
        let mut session = NagSession::new(config, t(0)).unwrap();
        let count = (1..=200)
            .flat_map(|s| session.tick(t(s * 1000)))
            .filter(|e| matches!(e, NagEvent::MilestoneUnlocked { .. }))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_restart_records_work() {
        let mut session = session();
        for s in 1..=10 {
            session.tick(t(s * 1000));
        }
        session.trigger(PunishmentReason::Eyes);

        let events = session.restart(t(11_000));
        assert_eq!(
            events,
            vec![
                NagEvent::WorkRecorded {
                    date: t(0).date_naive(),
                    seconds: 10,
                },
                NagEvent::PunishmentEnded,
            ]
        );
        assert_eq!(session.total_work_seconds(), 0);
    }

    #[test]
    fn test_restart_keeps_last_kpi_crossing() {
        let config = NagConfig {
            kpi_minutes: 1,
            inactivity_limit_secs: 10_000,
            milestone_seed: Some(3),
            ..NagConfig::default()
        };
        let mut session = NagSession::new(config, t(0)).unwrap();

        let mut unlocked_at = Vec::new();
        let mut run = |session: &mut NagSession, seconds: std::ops::RangeInclusive<i64>| {
            for s in seconds {
                let events = session.tick(t(s * 1000));
                if events
                    .iter()
                    .any(|e| matches!(e, NagEvent::MilestoneUnlocked { .. }))
                {
                    unlocked_at.push(session.total_work_seconds());
                    session.finish_milestone();
                }
            }
        };

        run(&mut session, 1..=60);
        session.restart(t(60_500));
        run(&mut session, 61..=199);

        // Minute 1 was crossed before the restart, so the next unlock waits for minute 2
        assert_eq!(unlocked_at, vec![60, 120]);
    }

    #[test]
    fn test_progress_restore() {
        let config = NagConfig {
            inactivity_limit_secs: 10_000,
            milestone_seed: Some(7),
            ..NagConfig::default()
        };
        let mut session = NagSession::new(config, t(0)).unwrap();
        let mut snapshot = ProgressSnapshot {
            kpi_minutes: Some(1),
            ..ProgressSnapshot::default()
        };
        snapshot.record_work(t(0).date_naive(), 90);
        snapshot.unlocked_milestones.insert("🇳🇴 Oslo".to_string());

        session.restore_progress(snapshot, t(0));
        assert_eq!(session.total_work_seconds(), 90);
        assert_eq!(session.kpi_minutes(), 1);
        assert_eq!(session.unlocked_milestones(), 1);

        // Minute 1 was already earned before the reload; next crossing is minute 2
        let mut fired = Vec::new();
        for s in 1..=40 {
            if session
                .tick(t(s * 1000))
                .iter()
                .any(|e| matches!(e, NagEvent::MilestoneUnlocked { .. }))
            {
                fired.push(session.total_work_seconds());
            }
        }
        assert_eq!(fired, vec![120]);
    }

    #[test]
    fn test_apply_dispatches_inputs() {
        let mut session = session();
        let start = session
            .apply(SessionInput::CaptureStart { timestamp: t(0) })
            .unwrap();
        assert_eq!(start, vec![NagEvent::camera(CameraStatus::On)]);

        let frame = session
            .apply(SessionInput::FaceFrame {
                timestamp: t(100),
                faces: vec![face(0.3, 0.1)],
            })
            .unwrap();
        assert_eq!(frame, vec![NagEvent::camera(CameraStatus::EyesOpen)]);

        assert!(session
            .apply(SessionInput::SetKpi {
                timestamp: t(200),
                minutes: 0
            })
            .is_err());
        session
            .apply(SessionInput::SetKpi {
                timestamp: t(200),
                minutes: 5,
            })
            .unwrap();
        assert_eq!(session.kpi_minutes(), 5);

        session
            .apply(SessionInput::CaptureStop { timestamp: t(300) })
            .unwrap();
        let late = session
            .apply(SessionInput::FaceFrame {
                timestamp: t(400),
                faces: vec![face(0.1, 0.1)],
            })
            .unwrap();
        assert!(late.is_empty());
    }

    #[test]
    fn test_idle_limit_from_config() {
        let config = NagConfig {
            inactivity_limit_secs: 3,
            ..NagConfig::default()
        };
        let mut session = NagSession::new(config, t(0)).unwrap();
        session.tick(t(1_000));
        session.tick(t(2_000));
        assert!(!session.is_punishing());
        session.tick(t(0) + Duration::seconds(3));
        assert!(session.is_punishing());
    }
}
