//! Timer-driven battle mini-game.
//!
//! ## Phases
//!
//! ```text
//! NotStarted -> InBattle -> (Victory | Defeat) -> NotStarted
//! ```
//!
//! While a wave is in progress two one-second timers run: the combat round
//! (movement and attacks) and health regeneration. Both are cancelled as soon
//! as the wave ends.

mod character;
mod enemies;
mod log;

use rand::{Rng, SeedableRng};
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use character::{roll_damage, BattleCharacter, Hit, Position, ARENA_SIZE};
pub use enemies::{enemy_count, spawn_wave, tier_for_wave, wave_scale, EnemyTier, ENEMY_TIERS};
pub use log::{BattleLog, LogEntry, LOG_CAPACITY};

use chrono::Duration;

use crate::bus::EventBus;
use crate::error::BattleError;
use crate::events::Event;
use crate::scheduler::{Scheduler, TimerId, TimerKind};
use crate::storage::BattleConfig;

/// Entries shown to the user.
pub const VISIBLE_LOG: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattlePhase {
    NotStarted,
    InBattle,
    Victory,
    Defeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Attack,
    Defense,
    MaxHealth,
    CritRate,
    CritDamage,
    HealthRegen,
}

impl Attribute {
    fn apply(self, c: &mut BattleCharacter) {
        match self {
            Attribute::Attack => c.attack += 2.0,
            Attribute::Defense => c.defense += 1.0,
            Attribute::MaxHealth => {
                c.max_health += 20.0;
                c.health += 20.0;
            }
            Attribute::CritRate => c.crit_rate = (c.crit_rate + 0.02).min(1.0),
            Attribute::CritDamage => c.crit_damage += 0.1,
            Attribute::HealthRegen => c.health_regen += 1.0,
        }
    }
}

impl std::str::FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "attack" => Ok(Attribute::Attack),
            "defense" => Ok(Attribute::Defense),
            "maxhealth" | "health" => Ok(Attribute::MaxHealth),
            "critrate" => Ok(Attribute::CritRate),
            "critdamage" => Ok(Attribute::CritDamage),
            "healthregen" | "regen" => Ok(Attribute::HealthRegen),
            other => Err(format!("unknown attribute: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleState {
    pub phase: BattlePhase,
    pub wave: u32,
    pub round: u32,
    pub player: BattleCharacter,
    pub enemies: Vec<BattleCharacter>,
    pub gold: u64,
    pub exp: u64,
    pub level: u32,
    #[serde(default)]
    pub log: BattleLog,
}

impl Default for BattleState {
    fn default() -> Self {
        Self {
            phase: BattlePhase::NotStarted,
            wave: 1,
            round: 0,
            player: BattleCharacter::player(),
            enemies: Vec::new(),
            gold: 0,
            exp: 0,
            level: 1,
            log: BattleLog::default(),
        }
    }
}

impl BattleState {
    pub fn exp_to_next_level(&self) -> u64 {
        self.level as u64 * 20
    }

    pub fn living_enemies(&self) -> usize {
        self.enemies.iter().filter(|e| !e.is_dead()).count()
    }
}

/// One landed attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    pub attacker: String,
    pub target: String,
    pub damage: f64,
    pub crit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    pub hits: Vec<HitRecord>,
    /// Set when this round ended the wave.
    pub outcome: Option<BattlePhase>,
}

#[derive(Debug)]
pub struct BattleSystem {
    state: BattleState,
    config: BattleConfig,
    rng: Mcg128Xsl64,
    bus: EventBus,
    round_timer: Option<TimerId>,
    regen_timer: Option<TimerId>,
}

impl BattleSystem {
    pub fn new(config: BattleConfig, bus: EventBus) -> Self {
        Self::from_state(BattleState::default(), config, bus)
    }

    pub fn from_state(mut state: BattleState, config: BattleConfig, bus: EventBus) -> Self {
        state.player.normalize();
        state.wave = state.wave.max(1);
        state.level = state.level.max(1);
        let rng = match config.seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        Self {
            state,
            config,
            rng,
            bus,
            round_timer: None,
            regen_timer: None,
        }
    }

    pub fn state(&self) -> &BattleState {
        &self.state
    }

    pub fn phase(&self) -> BattlePhase {
        self.state.phase
    }

    pub fn recent_log(&self) -> Vec<LogEntry> {
        self.state.log.recent(VISIBLE_LOG)
    }

    // ── Timers ───────────────────────────────────────────────────────

    /// Re-arm timers after loading a wave that was in progress.
    pub fn restore(&mut self, scheduler: &mut Scheduler) {
        if self.state.phase == BattlePhase::InBattle && self.round_timer.is_none() {
            self.arm(scheduler);
        }
    }

    pub fn dispose(&mut self, scheduler: &mut Scheduler) {
        for id in [self.round_timer.take(), self.regen_timer.take()].into_iter().flatten() {
            scheduler.cancel(id);
        }
    }

    fn arm(&mut self, scheduler: &mut Scheduler) {
        self.dispose(scheduler);
        let interval = self.config.round_interval();
        self.round_timer = Some(scheduler.every(TimerKind::BattleRound, interval));
        self.regen_timer = Some(scheduler.every(TimerKind::BattleRegen, Duration::seconds(1)));
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start `wave` with the player at full health.
    pub fn start_wave(&mut self, scheduler: &mut Scheduler, wave: u32) -> Result<(), BattleError> {
        if wave == 0 {
            return Err(BattleError::InvalidWave);
        }
        if self.state.phase == BattlePhase::InBattle {
            return Err(BattleError::InvalidPhase {
                action: "start a wave",
                phase: self.state.phase,
            });
        }
        self.state.player.health = self.state.player.max_health;
        self.begin(scheduler, wave);
        Ok(())
    }

    /// After a victory, start the following wave. Health carries over.
    pub fn next_wave(&mut self, scheduler: &mut Scheduler) -> Result<u32, BattleError> {
        if self.state.phase != BattlePhase::Victory {
            return Err(BattleError::InvalidPhase {
                action: "advance to the next wave",
                phase: self.state.phase,
            });
        }
        let wave = self.state.wave + 1;
        self.bus.publish(Event::BattleNextWave { wave });
        self.begin(scheduler, wave);
        Ok(wave)
    }

    fn begin(&mut self, scheduler: &mut Scheduler, wave: u32) {
        self.state.wave = wave;
        self.state.round = 0;
        self.state.enemies = spawn_wave(wave);
        self.state.player.position = BattleCharacter::player().position;
        self.state.phase = BattlePhase::InBattle;
        let count = self.state.enemies.len();
        self.state
            .log
            .push(0, format!("Wave {wave} begins: {count} enemies"));
        self.arm(scheduler);

        info!(wave, enemies = count, "battle started");
        self.bus.publish(Event::BattleStarted {
            wave,
            enemies: count,
        });
    }

    /// Abort the wave, or clear a finished one.
    pub fn stop(&mut self, scheduler: &mut Scheduler) -> Result<(), BattleError> {
        if self.state.phase == BattlePhase::NotStarted {
            return Err(BattleError::InvalidPhase {
                action: "stop",
                phase: self.state.phase,
            });
        }
        self.dispose(scheduler);
        self.state.phase = BattlePhase::NotStarted;
        self.state.enemies.clear();
        self.state.log.push(self.state.round, "Battle stopped");
        self.bus.publish(Event::BattleStopped {
            wave: self.state.wave,
        });
        Ok(())
    }

    /// Spend gold on a permanent stat gain. Nothing changes when the player
    /// cannot afford it.
    pub fn upgrade_attribute(&mut self, attribute: Attribute, cost: u64) -> bool {
        if self.state.gold < cost {
            return false;
        }
        self.state.gold -= cost;
        attribute.apply(&mut self.state.player);
        self.state.player.normalize();
        debug!(?attribute, cost, "battle attribute upgraded");
        self.bus.publish(Event::BattleUpgraded {
            attribute,
            cost,
            gold_left: self.state.gold,
        });
        true
    }

    /// One combat round. The player closes on the nearest living enemy and
    /// strikes when in range, then every living enemy does the same.
    pub fn combat_round(&mut self, scheduler: &mut Scheduler) -> RoundReport {
        let mut report = RoundReport::default();
        if self.state.phase != BattlePhase::InBattle {
            return report;
        }
        self.state.round += 1;
        let round = self.state.round;
        let range = self.config.attack_range;
        let jitter = self.config.jitter;

        if let Some(target) = self.nearest_enemy() {
            let enemy_pos = self.state.enemies[target].position;
            self.state.player.approach(&enemy_pos, range);
            if self.state.player.position.distance_to(&enemy_pos) <= range + 1e-9 {
                let enemy = &mut self.state.enemies[target];
                let hit = roll_damage(&self.state.player, enemy, jitter, &mut self.rng);
                enemy.take_damage(hit.damage);
                report.hits.push(HitRecord {
                    attacker: self.state.player.name.clone(),
                    target: enemy.name.clone(),
                    damage: hit.damage,
                    crit: hit.crit,
                });
                if enemy.is_dead() {
                    let name = enemy.name.clone();
                    self.state.log.push(round, format!("{name} was defeated"));
                }
            }
        }

        for i in 0..self.state.enemies.len() {
            if self.state.player.is_dead() {
                break;
            }
            let player_pos = self.state.player.position;
            let enemy = &mut self.state.enemies[i];
            if enemy.is_dead() {
                continue;
            }
            enemy.approach(&player_pos, range);
            if enemy.position.distance_to(&player_pos) <= range + 1e-9 {
                let hit = roll_damage(enemy, &self.state.player, jitter, &mut self.rng);
                self.state.player.take_damage(hit.damage);
                report.hits.push(HitRecord {
                    attacker: enemy.name.clone(),
                    target: self.state.player.name.clone(),
                    damage: hit.damage,
                    crit: hit.crit,
                });
            }
        }

        for hit in &report.hits {
            let crit = if hit.crit { " (critical)" } else { "" };
            self.state.log.push(
                round,
                format!("{} hits {} for {}{crit}", hit.attacker, hit.target, hit.damage),
            );
        }

        if self.state.player.is_dead() {
            self.finish_defeat(scheduler);
            report.outcome = Some(BattlePhase::Defeat);
        } else if self.state.living_enemies() == 0 {
            self.finish_victory(scheduler);
            report.outcome = Some(BattlePhase::Victory);
        }
        report
    }

    pub fn regen_tick(&mut self) {
        if self.state.phase != BattlePhase::InBattle {
            return;
        }
        let regen = self.state.player.health_regen;
        self.state.player.heal(regen);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn nearest_enemy(&self) -> Option<usize> {
        let from = self.state.player.position;
        self.state
            .enemies
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_dead())
            .min_by(|(_, a), (_, b)| {
                a.position
                    .distance_to(&from)
                    .total_cmp(&b.position.distance_to(&from))
            })
            .map(|(i, _)| i)
    }

    fn finish_victory(&mut self, scheduler: &mut Scheduler) {
        self.dispose(scheduler);
        let wave = self.state.wave;
        let gold = (10.0 * wave as f64 * (1.0 + self.rng.gen::<f64>())).floor() as u64;
        let exp = 5 * wave as u64;
        self.state.gold += gold;
        self.state.exp += exp;
        self.state.phase = BattlePhase::Victory;
        self.state
            .log
            .push(self.state.round, format!("Victory! +{gold} gold, +{exp} exp"));
        while self.state.exp >= self.state.exp_to_next_level() {
            self.state.exp -= self.state.exp_to_next_level();
            self.state.level += 1;
            let p = &mut self.state.player;
            p.max_health += 10.0;
            p.health = (p.health + 10.0).min(p.max_health);
            p.attack += 2.0;
            p.defense += 1.0;
            self.state
                .log
                .push(self.state.round, format!("Reached level {}", self.state.level));
        }

        info!(wave, gold, exp, "battle won");
        self.bus.publish(Event::BattleVictory { wave, gold, exp });
    }

    fn finish_defeat(&mut self, scheduler: &mut Scheduler) {
        self.dispose(scheduler);
        self.state.phase = BattlePhase::Defeat;
        self.state
            .log
            .push(self.state.round, format!("Defeated on wave {}", self.state.wave));
        info!(wave = self.state.wave, "battle lost");
        self.bus.publish(Event::BattleDefeat {
            wave: self.state.wave,
        });
    }
}
