//! Focus timer engine.
//!
//! One session at a time, driven by a one-second countdown timer registered
//! with the [`Scheduler`].
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Active -> (Paused <-> Active) -> Idle   (stop or completion)
//! ```
//!
//! Commands issued from the wrong state return
//! [`TransitionError::InvalidState`] and leave everything untouched.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bus::EventBus;
use crate::error::TransitionError;
use crate::events::Event;
use crate::scheduler::{Scheduler, TimerId, TimerKind};
use crate::storage::FocusConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusState {
    Idle,
    Active,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Work,
    Break,
    LongBreak,
}

/// Persistent focus state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSession {
    pub state: FocusState,
    pub session_type: SessionType,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub completed_today: u32,
    pub completed_total: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default)]
    pub total_focus_minutes: u64,
    /// Day `completed_today` counts for.
    #[serde(default)]
    pub today: Option<NaiveDate>,
    #[serde(default)]
    pub next_break_is_long: bool,
}

impl Default for FocusSession {
    fn default() -> Self {
        Self {
            state: FocusState::Idle,
            session_type: SessionType::Work,
            remaining_seconds: 0,
            total_seconds: 0,
            completed_today: 0,
            completed_total: 0,
            current_streak: 0,
            longest_streak: 0,
            total_focus_minutes: 0,
            today: None,
            next_break_is_long: false,
        }
    }
}

impl FocusSession {
    /// 0.0 .. 1.0 progress within the current session.
    pub fn progress(&self) -> f64 {
        if self.total_seconds == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_seconds as f64 / self.total_seconds as f64)
    }
}

/// What a finished session produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_type: SessionType,
    pub minutes: u32,
    /// Coins owed to the economy. Zero for breaks.
    pub reward: u64,
    pub streak: u32,
    pub next_break_long: bool,
}

/// Core focus timer.
#[derive(Debug)]
pub struct FocusTimer {
    session: FocusSession,
    config: FocusConfig,
    bus: EventBus,
    countdown: Option<TimerId>,
}

impl FocusTimer {
    pub fn new(config: FocusConfig, bus: EventBus) -> Self {
        Self::from_session(FocusSession::default(), config, bus)
    }

    pub fn from_session(mut session: FocusSession, config: FocusConfig, bus: EventBus) -> Self {
        session.remaining_seconds = session.remaining_seconds.min(session.total_seconds);
        Self {
            session,
            config,
            bus,
            countdown: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn session(&self) -> &FocusSession {
        &self.session
    }

    pub fn state(&self) -> FocusState {
        self.session.state
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.session.remaining_seconds
    }

    // ── Timers ───────────────────────────────────────────────────────

    /// Re-arm the countdown after loading an active session.
    pub fn restore(&mut self, scheduler: &mut Scheduler) {
        if self.session.state == FocusState::Active && self.countdown.is_none() {
            self.arm(scheduler);
        }
    }

    pub fn dispose(&mut self, scheduler: &mut Scheduler) {
        self.disarm(scheduler);
    }

    fn arm(&mut self, scheduler: &mut Scheduler) {
        self.disarm(scheduler);
        self.countdown = Some(scheduler.every(TimerKind::FocusCountdown, Duration::seconds(1)));
    }

    fn disarm(&mut self, scheduler: &mut Scheduler) {
        if let Some(id) = self.countdown.take() {
            scheduler.cancel(id);
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a work session. `minutes` defaults to the configured length.
    pub fn start_work(
        &mut self,
        scheduler: &mut Scheduler,
        minutes: Option<u32>,
    ) -> Result<(), TransitionError> {
        let minutes = minutes.unwrap_or(self.config.work_minutes);
        self.begin(scheduler, SessionType::Work, minutes, "start work")
    }

    /// Start a break. `long` defaults to whether the last completed work
    /// session closed a cycle.
    pub fn start_break(
        &mut self,
        scheduler: &mut Scheduler,
        long: Option<bool>,
    ) -> Result<(), TransitionError> {
        let long = long.unwrap_or(self.session.next_break_is_long);
        let (session_type, minutes) = if long {
            (SessionType::LongBreak, self.config.long_break_minutes)
        } else {
            (SessionType::Break, self.config.short_break_minutes)
        };
        self.begin(scheduler, session_type, minutes, "start break")
    }

    fn begin(
        &mut self,
        scheduler: &mut Scheduler,
        session_type: SessionType,
        minutes: u32,
        action: &'static str,
    ) -> Result<(), TransitionError> {
        self.expect_state(FocusState::Idle, action)?;
        if minutes == 0 {
            return Err(TransitionError::InvalidDuration(minutes));
        }
        self.roll_day(scheduler.now());

        let total = minutes.saturating_mul(60);
        self.session.session_type = session_type;
        self.session.total_seconds = total;
        self.session.remaining_seconds = total;
        self.session.state = FocusState::Active;
        self.arm(scheduler);

        info!(?session_type, minutes, "focus session started");
        self.bus.publish(Event::FocusStarted {
            session_type,
            total_seconds: total,
        });
        Ok(())
    }

    pub fn pause(&mut self, scheduler: &mut Scheduler) -> Result<(), TransitionError> {
        self.expect_state(FocusState::Active, "pause")?;
        self.disarm(scheduler);
        self.session.state = FocusState::Paused;
        self.bus.publish(Event::FocusPaused {
            remaining_seconds: self.session.remaining_seconds,
        });
        Ok(())
    }

    pub fn resume(&mut self, scheduler: &mut Scheduler) -> Result<(), TransitionError> {
        self.expect_state(FocusState::Paused, "resume")?;
        self.session.state = FocusState::Active;
        self.arm(scheduler);
        self.bus.publish(Event::FocusResumed {
            remaining_seconds: self.session.remaining_seconds,
        });
        Ok(())
    }

    /// Abandon the current session. Abandoning work breaks the streak.
    pub fn stop(&mut self, scheduler: &mut Scheduler) -> Result<(), TransitionError> {
        if self.session.state == FocusState::Idle {
            return Err(TransitionError::InvalidState {
                action: "stop",
                state: FocusState::Idle,
            });
        }
        self.disarm(scheduler);
        let remaining = self.session.remaining_seconds;
        let session_type = self.session.session_type;
        if session_type == SessionType::Work {
            self.session.current_streak = 0;
        }
        self.session.remaining_seconds = 0;
        self.session.state = FocusState::Idle;

        info!(?session_type, remaining, "focus session stopped");
        self.bus.publish(Event::FocusStopped {
            session_type,
            remaining_seconds: remaining,
        });
        Ok(())
    }

    /// One second of countdown. Ignored unless the session is active.
    /// Returns the report when this tick finishes the session.
    pub fn tick(&mut self, scheduler: &mut Scheduler) -> Option<SessionReport> {
        if self.session.state != FocusState::Active {
            return None;
        }
        self.session.remaining_seconds = self.session.remaining_seconds.saturating_sub(1);
        self.bus.publish(Event::FocusTick {
            remaining_seconds: self.session.remaining_seconds,
            total_seconds: self.session.total_seconds,
        });
        if self.session.remaining_seconds == 0 {
            return self.complete_session(scheduler).ok();
        }
        None
    }

    /// Finish the running session now.
    pub fn complete_session(
        &mut self,
        scheduler: &mut Scheduler,
    ) -> Result<SessionReport, TransitionError> {
        if self.session.state == FocusState::Idle {
            return Err(TransitionError::InvalidState {
                action: "complete",
                state: FocusState::Idle,
            });
        }
        self.disarm(scheduler);
        self.roll_day(scheduler.now());

        let session_type = self.session.session_type;
        let minutes = self.session.total_seconds / 60;
        let mut reward = 0;

        match session_type {
            SessionType::Work => {
                let s = &mut self.session;
                s.completed_today += 1;
                s.completed_total += 1;
                s.current_streak += 1;
                s.longest_streak = s.longest_streak.max(s.current_streak);
                s.total_focus_minutes += minutes as u64;

                let cycle = self.config.sessions_until_long_break.max(1);
                let closes_cycle = s.completed_today % cycle == 0;
                s.next_break_is_long = closes_cycle;
                reward = self.config.base_reward;
                if closes_cycle {
                    reward += self.config.cycle_bonus;
                }
            }
            SessionType::LongBreak => self.session.next_break_is_long = false,
            SessionType::Break => {}
        }

        self.session.remaining_seconds = 0;
        self.session.state = FocusState::Idle;

        let report = SessionReport {
            session_type,
            minutes,
            reward,
            streak: self.session.current_streak,
            next_break_long: self.session.next_break_is_long,
        };
        info!(?session_type, minutes, reward, "focus session completed");
        self.bus.publish(Event::FocusCompleted {
            session_type,
            minutes,
            reward,
            streak: report.streak,
            next_break_long: report.next_break_long,
        });
        Ok(report)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn expect_state(
        &self,
        wanted: FocusState,
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if self.session.state != wanted {
            return Err(TransitionError::InvalidState {
                action,
                state: self.session.state,
            });
        }
        Ok(())
    }

    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.session.today != Some(today) {
            if self.session.today.is_some() {
                debug!(%today, "new focus day");
            }
            self.session.today = Some(today);
            self.session.completed_today = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::topics;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap()
    }

    fn setup() -> (FocusTimer, Scheduler, EventBus) {
        let bus = EventBus::new();
        let timer = FocusTimer::new(FocusConfig::default(), bus.clone());
        (timer, Scheduler::new(t0()), bus)
    }

    /// Drive the countdown through the scheduler like the game loop does.
    fn run_for(timer: &mut FocusTimer, s: &mut Scheduler, secs: i64) -> Vec<SessionReport> {
        let until = s.now() + Duration::seconds(secs);
        let mut reports = Vec::new();
        while let Some(fired) = s.pop_due(until) {
            assert_eq!(fired.kind, TimerKind::FocusCountdown);
            reports.extend(timer.tick(s));
        }
        s.advance_to(until);
        reports
    }

    #[test]
    fn start_pause_resume_stop() {
        let (mut timer, mut s, _) = setup();
        assert_eq!(timer.state(), FocusState::Idle);

        timer.start_work(&mut s, None).unwrap();
        assert_eq!(timer.state(), FocusState::Active);
        assert_eq!(timer.remaining_seconds(), 25 * 60);

        timer.pause(&mut s).unwrap();
        assert_eq!(timer.state(), FocusState::Paused);
        assert_eq!(s.pending_count(), 0);

        timer.resume(&mut s).unwrap();
        assert_eq!(timer.state(), FocusState::Active);

        timer.stop(&mut s).unwrap();
        assert_eq!(timer.state(), FocusState::Idle);
        assert_eq!(timer.remaining_seconds(), 0);
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn invalid_transitions_are_reported() {
        let (mut timer, mut s, _) = setup();
        assert_eq!(
            timer.pause(&mut s),
            Err(TransitionError::InvalidState {
                action: "pause",
                state: FocusState::Idle
            })
        );
        assert!(timer.resume(&mut s).is_err());
        assert!(timer.stop(&mut s).is_err());

        timer.start_work(&mut s, Some(10)).unwrap();
        assert!(timer.resume(&mut s).is_err());
        assert!(timer.start_break(&mut s, None).is_err());
        assert!(timer.start_work(&mut s, None).is_err());
        assert_eq!(timer.remaining_seconds(), 600);
    }

    #[test]
    fn zero_minutes_is_rejected() {
        let (mut timer, mut s, _) = setup();
        assert_eq!(
            timer.start_work(&mut s, Some(0)),
            Err(TransitionError::InvalidDuration(0))
        );
        assert_eq!(timer.state(), FocusState::Idle);
    }

    #[test]
    fn work_session_completes_after_full_countdown() {
        let (mut timer, mut s, bus) = setup();
        let completed = Rc::new(RefCell::new(Vec::new()));
        let c = Rc::clone(&completed);
        bus.subscribe(topics::FOCUS_COMPLETED, move |e| {
            c.borrow_mut().push(e.clone());
            Ok(())
        })
        .unwrap();

        timer.start_work(&mut s, Some(25)).unwrap();
        assert_eq!(timer.remaining_seconds(), 1500);

        assert!(run_for(&mut timer, &mut s, 1499).is_empty());
        assert_eq!(timer.remaining_seconds(), 1);
        let reports = run_for(&mut timer, &mut s, 1);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reward, FocusConfig::default().base_reward);

        assert_eq!(timer.session().completed_today, 1);
        assert_eq!(timer.state(), FocusState::Idle);
        assert_eq!(completed.borrow().len(), 1);
        assert!(matches!(
            completed.borrow()[0],
            Event::FocusCompleted {
                session_type: SessionType::Work,
                minutes: 25,
                ..
            }
        ));

        // Nothing left ticking.
        assert!(run_for(&mut timer, &mut s, 60).is_empty());
        assert_eq!(completed.borrow().len(), 1);
    }

    #[test]
    fn paused_session_does_not_count_down() {
        let (mut timer, mut s, _) = setup();
        timer.start_work(&mut s, Some(1)).unwrap();
        run_for(&mut timer, &mut s, 10);
        timer.pause(&mut s).unwrap();
        run_for(&mut timer, &mut s, 600);
        assert_eq!(timer.remaining_seconds(), 50);
        assert!(timer.tick(&mut s).is_none());
        assert_eq!(timer.remaining_seconds(), 50);
    }

    #[test]
    fn fourth_session_closes_cycle() {
        let (mut timer, mut s, _) = setup();
        let config = FocusConfig::default();
        let mut rewards = Vec::new();
        for _ in 0..4 {
            timer.start_work(&mut s, Some(1)).unwrap();
            let report = timer.complete_session(&mut s).unwrap();
            rewards.push(report.reward);
            timer.start_break(&mut s, None).unwrap();
            timer.complete_session(&mut s).unwrap();
        }
        assert_eq!(rewards[..3], [config.base_reward; 3]);
        assert_eq!(rewards[3], config.base_reward + config.cycle_bonus);
        assert_eq!(timer.session().current_streak, 4);
        assert_eq!(timer.session().longest_streak, 4);

        timer.start_work(&mut s, Some(1)).unwrap();
        timer.complete_session(&mut s).unwrap();
        timer.start_work(&mut s, Some(1)).unwrap();
        timer.complete_session(&mut s).unwrap();
        timer.start_work(&mut s, Some(1)).unwrap();
        timer.complete_session(&mut s).unwrap();
        timer.start_work(&mut s, Some(1)).unwrap();
        let report = timer.complete_session(&mut s).unwrap();
        assert!(report.next_break_long);
        timer.start_break(&mut s, None).unwrap();
        assert_eq!(timer.session().session_type, SessionType::LongBreak);
        assert_eq!(timer.remaining_seconds(), config.long_break_minutes * 60);
    }

    #[test]
    fn stopping_work_resets_streak_but_keeps_longest() {
        let (mut timer, mut s, _) = setup();
        timer.start_work(&mut s, Some(1)).unwrap();
        timer.complete_session(&mut s).unwrap();
        timer.start_work(&mut s, Some(1)).unwrap();
        timer.stop(&mut s).unwrap();
        assert_eq!(timer.session().current_streak, 0);
        assert_eq!(timer.session().longest_streak, 1);
    }

    #[test]
    fn completed_today_resets_on_a_new_day() {
        let (mut timer, mut s, _) = setup();
        timer.start_work(&mut s, Some(1)).unwrap();
        timer.complete_session(&mut s).unwrap();
        assert_eq!(timer.session().completed_today, 1);

        s.advance_to(t0() + Duration::days(1));
        timer.start_work(&mut s, Some(1)).unwrap();
        assert_eq!(timer.session().completed_today, 0);
        timer.complete_session(&mut s).unwrap();
        assert_eq!(timer.session().completed_today, 1);
        assert_eq!(timer.session().completed_total, 2);
    }

    #[test]
    fn restore_rearms_active_session() {
        let (mut timer, mut s, bus) = setup();
        timer.start_work(&mut s, Some(1)).unwrap();
        let saved = timer.session().clone();

        let mut fresh = Scheduler::new(t0());
        let mut restored = FocusTimer::from_session(saved, FocusConfig::default(), bus);
        restored.restore(&mut fresh);
        assert_eq!(fresh.pending_count(), 1);
        run_for(&mut restored, &mut fresh, 5);
        assert_eq!(restored.remaining_seconds(), 55);
    }
}
