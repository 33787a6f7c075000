//! The coding buddy: mood and energy that decay over time, a behavior state
//! machine with timed reversions, level/exp progression and unlockable skins.
//!
//! Only one behavior reversion is ever pending. Starting a new timed behavior
//! cancels the previous reversion timer before arming a new one.
//!
//! Level-up is single-step: one call to [`Buddy::check_level_up`] gains at
//! most one level even if exp would cover several. Rewards are small next to
//! the `level × 100` threshold, so overflow carries into the next check.

mod skins;

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use skins::{find as find_skin, Skin, SkinStat, DEFAULT_SKIN, SKINS};

use crate::bus::EventBus;
use crate::deadline::DeadlineTask;
use crate::error::BuddyError;
use crate::events::Event;
use crate::focus::SessionType;
use crate::scheduler::{Scheduler, TimerId, TimerKind};
use crate::storage::BuddyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    Idle,
    Working,
    Resting,
    Celebrating,
    Sleepy,
    Anxious,
    Happy,
    Eating,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractAction {
    Pet,
    Feed,
    Play,
}

impl InteractAction {
    /// (mood delta, energy delta, behavior, behavior seconds)
    fn effect(self) -> (f64, f64, Behavior, i64) {
        match self {
            InteractAction::Pet => (10.0, 0.0, Behavior::Happy, 3),
            InteractAction::Feed => (5.0, 20.0, Behavior::Eating, 3),
            InteractAction::Play => (15.0, -10.0, Behavior::Playing, 5),
        }
    }
}

impl std::str::FromStr for InteractAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pet" => Ok(InteractAction::Pet),
            "feed" => Ok(InteractAction::Feed),
            "play" => Ok(InteractAction::Play),
            other => Err(format!("unknown interaction: {other}")),
        }
    }
}

/// A batch of edits reported by the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeDelta {
    pub lines: u32,
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuddyStats {
    pub today_lines: u64,
    pub total_lines: u64,
    pub focus_minutes: u64,
    pub coding_days: u32,
    pub ddls_completed: u32,
    /// Latest focus streak reported by the focus timer.
    pub streak: u32,
    #[serde(default)]
    pub last_coding_day: Option<NaiveDate>,
    #[serde(default)]
    pub modified_files: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuddyState {
    pub mood: f64,
    pub energy: f64,
    pub level: u32,
    pub exp: f64,
    pub behavior: Behavior,
    #[serde(default)]
    pub behavior_until: Option<DateTime<Utc>>,
    pub unlocked_skins: BTreeSet<String>,
    pub current_skin: String,
    pub last_interaction_at: DateTime<Utc>,
    #[serde(default)]
    pub stats: BuddyStats,
}

impl BuddyState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            mood: 80.0,
            energy: 100.0,
            level: 1,
            exp: 0.0,
            behavior: Behavior::Idle,
            behavior_until: None,
            unlocked_skins: BTreeSet::from([DEFAULT_SKIN.to_string()]),
            current_skin: DEFAULT_SKIN.to_string(),
            last_interaction_at: now,
            stats: BuddyStats::default(),
        }
    }

    pub fn exp_to_next_level(&self) -> f64 {
        self.level as f64 * 100.0
    }

    /// Clamp every bounded field back into range.
    fn normalize(&mut self) {
        self.mood = clamp_pct(self.mood);
        self.energy = clamp_pct(self.energy);
        self.level = self.level.max(1);
        self.exp = self.exp.max(0.0);
        self.unlocked_skins.insert(DEFAULT_SKIN.to_string());
        if !self.unlocked_skins.contains(&self.current_skin) {
            self.current_skin = DEFAULT_SKIN.to_string();
        }
    }
}

fn clamp_pct(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 100.0)
}

#[derive(Debug)]
pub struct Buddy {
    state: BuddyState,
    config: BuddyConfig,
    bus: EventBus,
    decay_timer: Option<TimerId>,
    revert_timer: Option<TimerId>,
}

impl Buddy {
    pub fn new(config: BuddyConfig, bus: EventBus, now: DateTime<Utc>) -> Self {
        Self::from_state(BuddyState::new(now), config, bus)
    }

    pub fn from_state(mut state: BuddyState, config: BuddyConfig, bus: EventBus) -> Self {
        state.normalize();
        Self {
            state,
            config,
            bus,
            decay_timer: None,
            revert_timer: None,
        }
    }

    pub fn state(&self) -> &BuddyState {
        &self.state
    }

    // ── Timers ───────────────────────────────────────────────────────

    /// Arm the decay clock and re-arm any timed behavior from a saved state.
    pub fn start(&mut self, scheduler: &mut Scheduler) {
        if let Some(id) = self.decay_timer.take() {
            scheduler.cancel(id);
        }
        let interval = self.config.decay_interval();
        self.decay_timer = Some(scheduler.every(TimerKind::BuddyDecay, interval));

        if self.revert_timer.is_none() {
            if let Some(until) = self.state.behavior_until {
                let delay = until - scheduler.now();
                self.revert_timer = Some(scheduler.after(TimerKind::BehaviorRevert, delay));
            }
        }
    }

    pub fn dispose(&mut self, scheduler: &mut Scheduler) {
        for id in [self.decay_timer.take(), self.revert_timer.take()].into_iter().flatten() {
            scheduler.cancel(id);
        }
    }

    /// Whether `id` is the reversion this buddy is waiting for.
    pub fn owns_revert(&self, id: TimerId) -> bool {
        self.revert_timer == Some(id)
    }

    // ── Behavior ─────────────────────────────────────────────────────

    /// Switch behavior now. A positive `duration` reverts to idle afterwards,
    /// replacing any reversion already pending.
    pub fn change_behavior(
        &mut self,
        scheduler: &mut Scheduler,
        behavior: Behavior,
        duration: Duration,
    ) {
        if let Some(id) = self.revert_timer.take() {
            scheduler.cancel(id);
        }
        let until = if duration > Duration::zero() {
            self.revert_timer = Some(scheduler.after(TimerKind::BehaviorRevert, duration));
            Some(scheduler.time_after(duration))
        } else {
            None
        };

        let from = self.state.behavior;
        self.state.behavior = behavior;
        self.state.behavior_until = until;
        debug!(?from, to = ?behavior, ?until, "buddy behavior changed");
        self.bus.publish(Event::BuddyBehaviorChanged {
            from,
            to: behavior,
            until,
        });
    }

    /// Called when the pending reversion timer fires.
    pub fn revert_behavior(&mut self, scheduler: &mut Scheduler, id: TimerId) {
        if !self.owns_revert(id) {
            return;
        }
        self.revert_timer = None;
        self.change_behavior(scheduler, Behavior::Idle, Duration::zero());
    }

    /// Periodic decay. Also nags about the first pending task that is less
    /// than `urgent_hours` away, in list order.
    pub fn decay_tick(
        &mut self,
        scheduler: &mut Scheduler,
        pending: &[DeadlineTask],
    ) -> Option<String> {
        let now = scheduler.now();
        self.state.mood = clamp_pct(self.state.mood - self.config.mood_decay);
        self.state.energy = clamp_pct(self.state.energy - self.config.energy_decay);

        let idle_for = now - self.state.last_interaction_at;
        if idle_for > self.config.sleepy_after()
            && self.state.behavior != Behavior::Sleepy
        {
            self.change_behavior(scheduler, Behavior::Sleepy, Duration::zero());
        }

        let urgent = pending.iter().find(|t| {
            let hours = t.hours_left(now);
            !t.completed && hours > 0.0 && hours < self.config.urgent_hours
        })?;
        self.bus.publish(Event::DeadlineUrgent {
            task_id: urgent.id.clone(),
            name: urgent.name.clone(),
            hours_left: urgent.hours_left(now),
        });
        Some(urgent.id.clone())
    }

    pub fn on_code_changed(&mut self, scheduler: &mut Scheduler, delta: &CodeDelta) {
        let now = scheduler.now();
        let today = now.date_naive();
        let stats = &mut self.state.stats;
        if stats.last_coding_day != Some(today) {
            stats.last_coding_day = Some(today);
            stats.coding_days += 1;
            stats.today_lines = 0;
            stats.modified_files.clear();
        }
        stats.today_lines += delta.lines as u64;
        stats.total_lines += delta.lines as u64;
        if let Some(file) = &delta.file {
            stats.modified_files.insert(file.clone());
        }
        self.state.last_interaction_at = now;

        let linger = self.config.working_linger();
        match self.state.behavior {
            Behavior::Idle | Behavior::Sleepy => {
                self.change_behavior(scheduler, Behavior::Working, linger)
            }
            Behavior::Working => self.extend_behavior(scheduler, linger),
            _ => {}
        }

        self.state.mood = clamp_pct(self.state.mood + 0.5);
        self.gain_exp(1.0 + delta.lines as f64 * 0.1);
        self.check_level_up();
        self.check_skin_unlocks();
    }

    pub fn interact(&mut self, scheduler: &mut Scheduler, action: InteractAction) {
        let (mood, energy, behavior, secs) = action.effect();
        self.state.mood = clamp_pct(self.state.mood + mood);
        self.state.energy = clamp_pct(self.state.energy + energy);
        self.state.last_interaction_at = scheduler.now();
        self.change_behavior(scheduler, behavior, Duration::seconds(secs));
        self.gain_exp(2.0);

        info!(?action, mood = self.state.mood, energy = self.state.energy, "buddy interaction");
        self.bus.publish(Event::BuddyInteracted {
            action,
            mood: self.state.mood,
            energy: self.state.energy,
        });
        self.check_level_up();
    }

    pub fn change_skin(&mut self, id: &str) -> Result<(), BuddyError> {
        if find_skin(id).is_none() {
            return Err(BuddyError::UnknownSkin(id.to_string()));
        }
        if !self.state.unlocked_skins.contains(id) {
            return Err(BuddyError::SkinLocked(id.to_string()));
        }
        self.state.current_skin = id.to_string();
        self.bus.publish(Event::BuddySkinChanged {
            skin_id: id.to_string(),
        });
        Ok(())
    }

    // ── Progression ──────────────────────────────────────────────────

    fn gain_exp(&mut self, amount: f64) {
        if amount > 0.0 && amount.is_finite() {
            self.state.exp += amount;
        }
    }

    /// Gain at most one level. Returns true if a level was gained.
    pub fn check_level_up(&mut self) -> bool {
        let required = self.state.exp_to_next_level();
        if self.state.exp < required {
            return false;
        }
        self.state.exp -= required;
        self.state.level += 1;
        info!(level = self.state.level, "buddy level up");
        self.bus.publish(Event::BuddyLevelUp {
            level: self.state.level,
        });
        true
    }

    /// Unlock every locked skin whose condition is met. Returns the new ids.
    pub fn check_skin_unlocks(&mut self) -> Vec<String> {
        let mut unlocked = Vec::new();
        for skin in SKINS {
            let Some((stat, threshold)) = skin.unlock else {
                continue;
            };
            if self.state.unlocked_skins.contains(skin.id) {
                continue;
            }
            if stat.read(&self.state.stats) >= threshold {
                self.state.unlocked_skins.insert(skin.id.to_string());
                unlocked.push(skin.id.to_string());
            }
        }
        for id in &unlocked {
            info!(skin = %id, "skin unlocked");
            self.bus.publish(Event::BuddySkinUnlocked { skin_id: id.clone() });
        }
        unlocked
    }

    // ── Reactions ────────────────────────────────────────────────────

    pub fn on_focus_started(&mut self, scheduler: &mut Scheduler, session_type: SessionType) {
        let behavior = match session_type {
            SessionType::Work => Behavior::Working,
            SessionType::Break | SessionType::LongBreak => Behavior::Resting,
        };
        self.change_behavior(scheduler, behavior, Duration::zero());
    }

    pub fn on_focus_stopped(&mut self, scheduler: &mut Scheduler) {
        self.change_behavior(scheduler, Behavior::Idle, Duration::zero());
    }

    pub fn on_focus_completed(
        &mut self,
        scheduler: &mut Scheduler,
        session_type: SessionType,
        minutes: u32,
        streak: u32,
    ) {
        self.state.last_interaction_at = scheduler.now();
        match session_type {
            SessionType::Work => {
                self.state.stats.focus_minutes += minutes as u64;
                self.state.stats.streak = streak;
                self.state.mood = clamp_pct(self.state.mood + 5.0);
                self.gain_exp(minutes as f64);
                self.change_behavior(scheduler, Behavior::Celebrating, Duration::seconds(5));
                self.check_level_up();
                self.check_skin_unlocks();
            }
            SessionType::Break | SessionType::LongBreak => {
                self.state.energy = clamp_pct(self.state.energy + 15.0);
                self.change_behavior(scheduler, Behavior::Idle, Duration::zero());
            }
        }
    }

    pub fn on_deadline_completed(&mut self, scheduler: &mut Scheduler) {
        self.state.stats.ddls_completed += 1;
        self.state.mood = clamp_pct(self.state.mood + 10.0);
        self.state.last_interaction_at = scheduler.now();
        self.gain_exp(20.0);
        self.change_behavior(scheduler, Behavior::Celebrating, Duration::seconds(5));
        self.check_level_up();
        self.check_skin_unlocks();
    }

    pub fn on_deadline_urgent(&mut self, scheduler: &mut Scheduler) {
        if matches!(self.state.behavior, Behavior::Sleepy | Behavior::Anxious) {
            return;
        }
        self.change_behavior(scheduler, Behavior::Anxious, Duration::seconds(30));
    }

    pub fn on_achievement(&mut self, scheduler: &mut Scheduler) {
        if self.state.behavior == Behavior::Sleepy {
            return;
        }
        self.change_behavior(scheduler, Behavior::Celebrating, Duration::seconds(3));
    }

    /// Keep the current behavior but move its reversion to `duration` from now.
    fn extend_behavior(&mut self, scheduler: &mut Scheduler, duration: Duration) {
        if let Some(id) = self.revert_timer.take() {
            scheduler.cancel(id);
        }
        if duration > Duration::zero() {
            self.revert_timer = Some(scheduler.after(TimerKind::BehaviorRevert, duration));
            self.state.behavior_until = Some(scheduler.time_after(duration));
        } else {
            self.state.behavior_until = None;
        }
    }
}
