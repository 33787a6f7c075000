//! Virtual-time scheduler.
//!
//! Every periodic tick and delayed transition in the system is a timer owned
//! by this scheduler. The scheduler never calls back into components: the
//! caller pops due timers with [`Scheduler::pop_due`] and routes each one to
//! the component that registered it. Time only moves when the caller advances
//! it, so tests can fast-forward hours in a loop.
//!
//! ```text
//! every(kind, 1s) -> id        cancel(id)
//!        |                          |
//!   pop_due(until) -> Fired{id, kind, at}   (re-arms repeating timers)
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Opaque timer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(u64);

/// What a timer is for. The owner dispatches on this when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    EconomyProduction,
    FocusCountdown,
    BuddyDecay,
    BehaviorRevert,
    DeadlineScan,
    BattleRound,
    BattleRegen,
    AutoSave,
}

#[derive(Debug, Clone)]
struct Timer {
    kind: TimerKind,
    due: DateTime<Utc>,
    interval: Option<Duration>,
}

/// A timer that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub id: TimerId,
    pub kind: TimerKind,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    now: DateTime<Utc>,
    next_id: u64,
    timers: HashMap<TimerId, Timer>,
}

impl Scheduler {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            next_id: 0,
            timers: HashMap::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// `now + by`, saturating instead of overflowing.
    pub fn time_after(&self, by: Duration) -> DateTime<Utc> {
        later(self.now, by)
    }

    /// Repeating timer, first firing one `interval` from now.
    ///
    /// Non-positive intervals are bumped to one millisecond so a repeating
    /// timer can never fire twice at the same instant.
    pub fn every(&mut self, kind: TimerKind, interval: Duration) -> TimerId {
        let interval = interval.max(Duration::milliseconds(1));
        self.insert(kind, later(self.now, interval), Some(interval))
    }

    /// One-shot timer.
    pub fn after(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        let delay = delay.max(Duration::zero());
        self.insert(kind, later(self.now, delay), None)
    }

    fn insert(
        &mut self,
        kind: TimerKind,
        due: DateTime<Utc>,
        interval: Option<Duration>,
    ) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.insert(id, Timer { kind, due, interval });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.timers.len();
        self.timers.clear();
        n
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.timers.values().map(|t| t.due).min()
    }

    /// Pop the earliest timer due at or before `until`.
    ///
    /// Ties are broken by registration order. The scheduler clock moves to
    /// the fired timer's due time; repeating timers are re-armed from there.
    pub fn pop_due(&mut self, until: DateTime<Utc>) -> Option<Fired> {
        let (&id, _) = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(id, t)| (t.due, **id))?;

        let timer = self.timers.get_mut(&id)?;
        let fired = Fired {
            id,
            kind: timer.kind,
            at: timer.due,
        };
        if fired.at > self.now {
            self.now = fired.at;
        }
        match timer.interval {
            Some(interval) => timer.due = later(timer.due, interval),
            None => {
                self.timers.remove(&id);
            }
        }
        Some(fired)
    }

    /// Move the clock forward without firing anything. Moving backwards is
    /// ignored.
    pub fn advance_to(&mut self, t: DateTime<Utc>) {
        if t > self.now {
            self.now = t;
        }
    }
}

/// `t + by`, saturating at the end of representable time.
fn later(t: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    t.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
    }

    fn drain(s: &mut Scheduler, until: DateTime<Utc>) -> Vec<Fired> {
        let mut out = Vec::new();
        while let Some(f) = s.pop_due(until) {
            out.push(f);
        }
        s.advance_to(until);
        out
    }

    #[test]
    fn repeating_timer_fires_once_per_interval() {
        let mut s = Scheduler::new(t0());
        s.every(TimerKind::FocusCountdown, Duration::seconds(1));
        let fired = drain(&mut s, t0() + Duration::seconds(10));
        assert_eq!(fired.len(), 10);
        assert_eq!(fired[9].at, t0() + Duration::seconds(10));
        assert_eq!(s.now(), t0() + Duration::seconds(10));
    }

    #[test]
    fn one_shot_fires_once_and_is_removed() {
        let mut s = Scheduler::new(t0());
        let id = s.after(TimerKind::BehaviorRevert, Duration::seconds(5));
        assert!(s.is_pending(id));
        assert!(s.pop_due(t0() + Duration::seconds(4)).is_none());
        let fired = drain(&mut s, t0() + Duration::minutes(1));
        assert_eq!(fired.len(), 1);
        assert!(!s.is_pending(id));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut s = Scheduler::new(t0());
        let id = s.every(TimerKind::BattleRound, Duration::seconds(1));
        assert!(s.cancel(id));
        assert!(!s.cancel(id));
        assert!(drain(&mut s, t0() + Duration::minutes(5)).is_empty());
    }

    #[test]
    fn ties_break_by_registration_order() {
        let mut s = Scheduler::new(t0());
        s.every(TimerKind::BattleRound, Duration::seconds(1));
        s.every(TimerKind::BattleRegen, Duration::seconds(1));
        let fired = drain(&mut s, t0() + Duration::seconds(2));
        let kinds: Vec<_> = fired.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TimerKind::BattleRound,
                TimerKind::BattleRegen,
                TimerKind::BattleRound,
                TimerKind::BattleRegen
            ]
        );
    }

    #[test]
    fn interleaves_timers_by_due_time() {
        let mut s = Scheduler::new(t0());
        s.every(TimerKind::DeadlineScan, Duration::seconds(10));
        s.every(TimerKind::EconomyProduction, Duration::seconds(3));
        let fired = drain(&mut s, t0() + Duration::seconds(10));
        let kinds: Vec<_> = fired.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TimerKind::EconomyProduction,
                TimerKind::EconomyProduction,
                TimerKind::EconomyProduction,
                TimerKind::DeadlineScan,
            ]
        );
    }

    #[test]
    fn far_future_timers_saturate() {
        let mut s = Scheduler::new(t0());
        let once = s.after(TimerKind::AutoSave, Duration::MAX);
        let repeating = s.every(TimerKind::DeadlineScan, Duration::MAX);
        assert_eq!(s.next_due(), Some(DateTime::<Utc>::MAX_UTC));
        assert!(drain(&mut s, t0() + Duration::days(365)).is_empty());
        assert!(s.is_pending(once) && s.is_pending(repeating));
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut s = Scheduler::new(t0());
        s.advance_to(t0() - Duration::hours(1));
        assert_eq!(s.now(), t0());
    }
}
