//! Composition root.
//!
//! [`Game`] owns every component, the scheduler and the bus. Commands from
//! the presentation layer go through [`Game::execute`]; time moves through
//! [`Game::advance_to`]. After each command or fired timer the events the
//! components published are routed to the components that react to them,
//! until no new events remain.
//!
//! ```text
//! Command -> owning component -> Event -> bus -> inbox -> react() -> ...
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::battle::{Attribute, BattleState, BattleSystem, LogEntry};
use crate::buddy::{Buddy, BuddyState, CodeDelta, InteractAction};
use crate::bus::{EventBus, Subscription};
use crate::deadline::{DeadlineTask, DeadlineTracker};
use crate::economy::{EarnSource, Economy, EconomyState, LotteryTier, Prize, Purchase};
use crate::error::{CoreError, DeadlineError, LotteryError, PersistenceError};
use crate::events::{topics, Event};
use crate::focus::{FocusSession, FocusTimer, SessionReport};
use crate::scheduler::{Fired, Scheduler, TimerId, TimerKind};
use crate::storage::persistence::{self, keys, Persistence};
use crate::storage::Config;

/// Finished sessions kept for the caller before the oldest are dropped.
pub const MAX_FINISHED_SESSIONS: usize = 256;

/// One user intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Click,
    Purchase {
        upgrade_id: String,
    },
    /// Buy a ticket. The prize waits for [`Command::Settle`].
    Lottery {
        tier: LotteryTier,
    },
    Settle,
    StartFocusWork {
        #[serde(default)]
        minutes: Option<u32>,
    },
    StartFocusBreak {
        #[serde(default)]
        long: Option<bool>,
    },
    PauseFocus,
    ResumeFocus,
    StopFocus,
    AddDeadline {
        name: String,
        deadline: DateTime<Utc>,
        #[serde(default)]
        description: Option<String>,
    },
    CompleteDeadline {
        id: String,
    },
    DeleteDeadline {
        id: String,
    },
    InteractWithBuddy {
        action: InteractAction,
    },
    ChangeSkin {
        skin_id: String,
    },
    CodeChanged {
        #[serde(flatten)]
        delta: CodeDelta,
    },
    StartBattle {
        #[serde(default)]
        wave: Option<u32>,
    },
    StopBattle,
    BattleUpgrade {
        attribute: Attribute,
        cost: u64,
    },
    BattleNextWave,
}

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Purchased(Purchase),
    Drawn { prize: Prize },
    Settled { prize: Prize },
    DeadlineAdded(DeadlineTask),
    Wave { wave: u32 },
    /// False when the player could not afford it.
    Upgraded { applied: bool },
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub now: DateTime<Utc>,
    pub economy: EconomyState,
    pub focus: FocusSession,
    pub buddy: BuddyState,
    pub deadlines: Vec<DeadlineTask>,
    pub battle: BattleState,
    pub pending_prize: Option<Prize>,
}

pub struct Game {
    config: Config,
    bus: EventBus,
    scheduler: Scheduler,
    economy: Economy,
    focus: FocusTimer,
    buddy: Buddy,
    deadlines: DeadlineTracker,
    battle: BattleSystem,
    lottery_rng: Mcg128Xsl64,
    pending_prize: Option<Prize>,
    inbox: Rc<RefCell<VecDeque<Event>>>,
    routes: Vec<Subscription>,
    autosave_timer: Option<TimerId>,
    save_requested: bool,
    finished_sessions: Vec<(SessionReport, DateTime<Utc>)>,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("now", &self.scheduler.now())
            .field("pending_timers", &self.scheduler.pending_count())
            .field("pending_prize", &self.pending_prize)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Saved {
    economy: Option<EconomyState>,
    economy_saved_at: Option<DateTime<Utc>>,
    focus: Option<FocusSession>,
    buddy: Option<BuddyState>,
    deadlines: Option<Vec<DeadlineTask>>,
    battle: Option<BattleState>,
}

impl Game {
    /// Fresh game starting at `now`.
    pub fn new(config: Config, now: DateTime<Utc>) -> Self {
        Self::assemble(config, now, Saved::default())
    }

    /// Restore every component from `store`, migrating a legacy save first.
    /// Production for the time since the last save is credited up to the
    /// configured cap. Countdowns resume where they were left.
    pub fn load(
        config: Config,
        store: &mut dyn Persistence,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        if persistence::migrate_legacy(store, now)? {
            info!("legacy save adopted");
        }
        let economy = persistence::read::<EconomyState>(store, keys::ECONOMY)?;
        let saved = Saved {
            economy_saved_at: economy.as_ref().map(|e| e.saved_at),
            economy: economy.map(|e| e.data),
            focus: persistence::read(store, keys::FOCUS)?.map(|e| e.data),
            buddy: persistence::read(store, keys::BUDDY)?.map(|e| e.data),
            deadlines: persistence::read(store, keys::DEADLINES)?.map(|e| e.data),
            battle: persistence::read(store, keys::BATTLE)?.map(|e| e.data),
        };
        Ok(Self::assemble(config, now, saved))
    }

    fn assemble(config: Config, now: DateTime<Utc>, saved: Saved) -> Self {
        let bus = EventBus::new();

        let economy = match saved.economy {
            Some(state) => Economy::from_state(state, bus.clone()),
            None => Economy::new(bus.clone()),
        };
        let focus = match saved.focus {
            Some(session) => FocusTimer::from_session(session, config.focus.clone(), bus.clone()),
            None => FocusTimer::new(config.focus.clone(), bus.clone()),
        };
        let buddy = match saved.buddy {
            Some(state) => Buddy::from_state(state, config.buddy.clone(), bus.clone()),
            None => Buddy::new(config.buddy.clone(), bus.clone(), now),
        };
        let deadlines = DeadlineTracker::from_tasks(
            saved.deadlines.unwrap_or_default(),
            config.deadlines.clone(),
            bus.clone(),
        );
        let battle = match saved.battle {
            Some(state) => BattleSystem::from_state(state, config.battle.clone(), bus.clone()),
            None => BattleSystem::new(config.battle.clone(), bus.clone()),
        };
        let lottery_rng = match config.economy.lottery_seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };

        let inbox: Rc<RefCell<VecDeque<Event>>> = Rc::default();
        let mut routes = Vec::with_capacity(topics::ALL.len());
        for topic in topics::ALL {
            let inbox = Rc::clone(&inbox);
            let route = bus.subscribe(topic, move |event| {
                inbox.borrow_mut().push_back(event.clone());
                Ok(())
            });
            match route {
                Ok(sub) => routes.push(sub),
                Err(e) => warn!(topic, error = %e, "failed to route topic"),
            }
        }

        let production_interval = config.economy.production_interval();

        let mut game = Self {
            config,
            bus,
            scheduler: Scheduler::new(now),
            economy,
            focus,
            buddy,
            deadlines,
            battle,
            lottery_rng,
            pending_prize: None,
            inbox,
            routes,
            autosave_timer: None,
            save_requested: false,
            finished_sessions: Vec::new(),
        };

        let sched = &mut game.scheduler;
        game.economy.start(sched, production_interval);
        game.focus.restore(sched);
        game.buddy.start(sched);
        game.deadlines.start(sched);
        game.battle.restore(sched);

        if let Some(saved_at) = saved.economy_saved_at {
            let cap = game.config.economy.offline_cap();
            game.economy.credit_offline(saved_at, now, cap);
        }
        game.drain();
        game
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn now(&self) -> DateTime<Utc> {
        self.scheduler.now()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The bus the presentation layer subscribes to.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Economy state with expired boosts left out.
    pub fn economy_state(&self) -> EconomyState {
        let now = self.now();
        let mut state = self.economy.state().clone();
        state.active_boosts.retain(|b| b.ends_at > now);
        state
    }

    pub fn focus_state(&self) -> FocusSession {
        self.focus.session().clone()
    }

    pub fn buddy_state(&self) -> BuddyState {
        self.buddy.state().clone()
    }

    pub fn pending_deadlines(&self) -> Vec<DeadlineTask> {
        self.deadlines.pending()
    }

    pub fn all_deadlines(&self) -> Vec<DeadlineTask> {
        self.deadlines.tasks().to_vec()
    }

    pub fn battle_state(&self) -> BattleState {
        self.battle.state().clone()
    }

    pub fn battle_log(&self) -> Vec<LogEntry> {
        self.battle.recent_log()
    }

    pub fn pending_prize(&self) -> Option<&Prize> {
        self.pending_prize.as_ref()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            now: self.now(),
            economy: self.economy_state(),
            focus: self.focus_state(),
            buddy: self.buddy_state(),
            deadlines: self.pending_deadlines(),
            battle: self.battle_state(),
            pending_prize: self.pending_prize.clone(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn execute(&mut self, command: Command) -> Result<Outcome, CoreError> {
        debug!(?command, "execute");
        let result = self.apply(command);
        self.drain();
        result
    }

    fn apply(&mut self, command: Command) -> Result<Outcome, CoreError> {
        let now = self.scheduler.now();
        let sched = &mut self.scheduler;
        let outcome = match command {
            Command::Click => {
                self.economy.click();
                Outcome::Done
            }
            Command::Purchase { upgrade_id } => {
                Outcome::Purchased(self.economy.purchase(&upgrade_id)?)
            }
            Command::Lottery { tier } => {
                if let Some(prize) = self.pending_prize.take() {
                    self.economy.settle(&prize, now);
                }
                let prize = self.economy.draw(tier, &mut self.lottery_rng)?;
                self.pending_prize = Some(prize.clone());
                Outcome::Drawn { prize }
            }
            Command::Settle => {
                let prize = self
                    .pending_prize
                    .take()
                    .ok_or(LotteryError::NothingToSettle)?;
                self.economy.settle(&prize, now);
                Outcome::Settled { prize }
            }
            Command::StartFocusWork { minutes } => {
                self.focus.start_work(sched, minutes)?;
                Outcome::Done
            }
            Command::StartFocusBreak { long } => {
                self.focus.start_break(sched, long)?;
                Outcome::Done
            }
            Command::PauseFocus => {
                self.focus.pause(sched)?;
                Outcome::Done
            }
            Command::ResumeFocus => {
                self.focus.resume(sched)?;
                Outcome::Done
            }
            Command::StopFocus => {
                self.focus.stop(sched)?;
                Outcome::Done
            }
            Command::AddDeadline {
                name,
                deadline,
                description,
            } => Outcome::DeadlineAdded(self.deadlines.add_task(
                &name,
                deadline,
                description.as_deref(),
                now,
            )?),
            Command::CompleteDeadline { id } => {
                if !self.deadlines.complete_task(&id, now) {
                    return Err(DeadlineError::UnknownTask(id).into());
                }
                Outcome::Done
            }
            Command::DeleteDeadline { id } => {
                if !self.deadlines.delete_task(&id) {
                    return Err(DeadlineError::UnknownTask(id).into());
                }
                Outcome::Done
            }
            Command::InteractWithBuddy { action } => {
                self.buddy.interact(sched, action);
                Outcome::Done
            }
            Command::ChangeSkin { skin_id } => {
                self.buddy.change_skin(&skin_id)?;
                Outcome::Done
            }
            Command::CodeChanged { delta } => {
                self.buddy.on_code_changed(sched, &delta);
                Outcome::Done
            }
            Command::StartBattle { wave } => {
                let wave = wave.unwrap_or(self.battle.state().wave);
                self.battle.start_wave(sched, wave)?;
                Outcome::Wave { wave }
            }
            Command::StopBattle => {
                self.battle.stop(sched)?;
                Outcome::Done
            }
            Command::BattleUpgrade { attribute, cost } => Outcome::Upgraded {
                applied: self.battle.upgrade_attribute(attribute, cost),
            },
            Command::BattleNextWave => Outcome::Wave {
                wave: self.battle.next_wave(sched)?,
            },
        };
        Ok(outcome)
    }

    // ── Time ─────────────────────────────────────────────────────────

    /// Fire every timer due up to `t`, in due order, then move the clock to
    /// `t`. Returns the number of timers fired.
    pub fn advance_to(&mut self, t: DateTime<Utc>) -> usize {
        let mut fired = 0;
        while let Some(timer) = self.scheduler.pop_due(t) {
            self.on_timer(timer);
            self.drain();
            fired += 1;
        }
        self.scheduler.advance_to(t);
        fired
    }

    pub fn advance(&mut self, by: Duration) -> usize {
        self.advance_to(self.scheduler.time_after(by))
    }

    fn on_timer(&mut self, fired: Fired) {
        let sched = &mut self.scheduler;
        match fired.kind {
            TimerKind::EconomyProduction => {
                let interval = self.config.economy.production_interval();
                let delta = interval.num_milliseconds() as f64 / 1000.0;
                self.economy.tick(delta, fired.at);
            }
            TimerKind::FocusCountdown => {
                self.focus.tick(sched);
            }
            TimerKind::BuddyDecay => {
                let pending = self.deadlines.pending();
                self.buddy.decay_tick(sched, &pending);
            }
            TimerKind::BehaviorRevert => self.buddy.revert_behavior(sched, fired.id),
            TimerKind::DeadlineScan => {
                self.deadlines.scan_deadlines(fired.at);
            }
            TimerKind::BattleRound => {
                self.battle.combat_round(sched);
            }
            TimerKind::BattleRegen => self.battle.regen_tick(),
            TimerKind::AutoSave => self.save_requested = true,
        }
    }

    /// Arm the periodic save request. Does nothing when disabled in config.
    pub fn start_autosave(&mut self) {
        if self.autosave_timer.is_some() {
            return;
        }
        let Some(interval) = self.config.storage.autosave_interval() else {
            return;
        };
        self.autosave_timer = Some(self.scheduler.every(TimerKind::AutoSave, interval));
    }

    /// Whether an autosave came due since the last call.
    pub fn take_save_request(&mut self) -> bool {
        std::mem::take(&mut self.save_requested)
    }

    /// Focus sessions finished since the last call, with completion time.
    /// At most [`MAX_FINISHED_SESSIONS`] are kept between calls.
    pub fn take_finished_sessions(&mut self) -> Vec<(SessionReport, DateTime<Utc>)> {
        std::mem::take(&mut self.finished_sessions)
    }

    // ── Routing ──────────────────────────────────────────────────────

    fn drain(&mut self) {
        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some(event) = next else { break };
            self.react(&event);
        }
    }

    fn react(&mut self, event: &Event) {
        let sched = &mut self.scheduler;
        match *event {
            Event::FocusStarted { session_type, .. } => {
                self.buddy.on_focus_started(sched, session_type)
            }
            Event::FocusStopped { .. } => self.buddy.on_focus_stopped(sched),
            Event::FocusCompleted {
                session_type,
                minutes,
                reward,
                streak,
                next_break_long,
            } => {
                self.economy.grant(reward, EarnSource::Reward);
                self.buddy
                    .on_focus_completed(sched, session_type, minutes, streak);
                if self.finished_sessions.len() >= MAX_FINISHED_SESSIONS {
                    warn!("finished session backlog full, dropping the oldest");
                    self.finished_sessions.remove(0);
                }
                self.finished_sessions.push((
                    SessionReport {
                        session_type,
                        minutes,
                        reward,
                        streak,
                        next_break_long,
                    },
                    sched.now(),
                ));
            }
            Event::DeadlineCompleted { .. } => self.buddy.on_deadline_completed(sched),
            Event::DeadlineUrgent { .. } => self.buddy.on_deadline_urgent(sched),
            Event::AchievementUnlocked { .. } => self.buddy.on_achievement(sched),
            _ => {}
        }
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Write every component to `store` and flush. A prize still waiting to
    /// be settled is settled first so the ticket is never lost.
    ///
    /// On failure the in-memory state is left as it is.
    pub fn save(&mut self, store: &mut dyn Persistence) -> Result<(), CoreError> {
        let now = self.now();
        if let Some(prize) = self.pending_prize.take() {
            self.economy.settle(&prize, now);
            self.drain();
        }
        let economy = self.economy.snapshot(now);
        if let Err(e) = self.write_all(store, &economy, now) {
            warn!(error = %e, "save failed");
            return Err(e.into());
        }
        debug!("game saved");
        Ok(())
    }

    fn write_all(
        &self,
        store: &mut dyn Persistence,
        economy: &EconomyState,
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        persistence::write(store, keys::ECONOMY, economy, now)?;
        persistence::write(store, keys::FOCUS, self.focus.session(), now)?;
        persistence::write(store, keys::BUDDY, self.buddy.state(), now)?;
        persistence::write(store, keys::DEADLINES, self.deadlines.tasks(), now)?;
        persistence::write(store, keys::BATTLE, self.battle.state(), now)?;
        store.flush()
    }

    /// Cancel every timer and detach from the bus.
    pub fn dispose(&mut self) {
        let sched = &mut self.scheduler;
        self.economy.dispose(sched);
        self.focus.dispose(sched);
        self.buddy.dispose(sched);
        self.deadlines.dispose(sched);
        self.battle.dispose(sched);
        if let Some(id) = self.autosave_timer.take() {
            sched.cancel(id);
        }
        for route in self.routes.drain(..) {
            route.unsubscribe();
        }
        self.inbox.borrow_mut().clear();
    }
}
