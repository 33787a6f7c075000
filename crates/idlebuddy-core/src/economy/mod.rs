//! Idle-game economy: coins, upgrades, boosts, discounts, achievements and
//! the lottery.
//!
//! Production is applied by a repeating one-second timer, not by measuring
//! wall-clock time. Time the host spends suspended is only credited through
//! [`Economy::credit_offline`], which is capped.

mod achievements;
mod lottery;
mod upgrades;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use achievements::{Achievement, ACHIEVEMENTS};
pub use lottery::{pick, prize_table, LotteryTier, Prize, PrizeEntry};
pub use upgrades::{catalogue, Upgrade, COST_GROWTH};

use crate::bus::EventBus;
use crate::error::{LotteryError, PurchaseError};
use crate::events::Event;
use crate::scheduler::{Scheduler, TimerId, TimerKind};

/// Number of purchases a lottery discount applies to.
pub const DISCOUNT_USES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarnSource {
    Click,
    Production,
    Reward,
    Lottery,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boost {
    pub multiplier: f64,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub percent: u8,
    pub uses_left: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyState {
    pub coins: f64,
    pub coins_per_second: f64,
    pub total_coins_earned: f64,
    #[serde(default)]
    pub total_clicks: u64,
    pub upgrades: BTreeMap<String, Upgrade>,
    #[serde(default)]
    pub active_boosts: Vec<Boost>,
    #[serde(default)]
    pub discounts: Vec<Discount>,
    #[serde(default)]
    pub achievements_unlocked: BTreeSet<String>,
    #[serde(default)]
    pub lottery_draws: u32,
}

impl Default for EconomyState {
    fn default() -> Self {
        let upgrades = catalogue()
            .into_iter()
            .map(|(id, u)| (id.to_string(), u))
            .collect();
        let mut state = Self {
            coins: 0.0,
            coins_per_second: 0.0,
            total_coins_earned: 0.0,
            total_clicks: 0,
            upgrades,
            active_boosts: Vec::new(),
            discounts: Vec::new(),
            achievements_unlocked: BTreeSet::new(),
            lottery_draws: 0,
        };
        state.recompute_production();
        state
    }
}

impl EconomyState {
    /// `1 + Σ count × production`
    pub fn recompute_production(&mut self) {
        self.coins_per_second = 1.0
            + self
                .upgrades
                .values()
                .map(Upgrade::total_production)
                .sum::<f64>();
    }

    /// Coins as shown to the user.
    pub fn display_coins(&self) -> u64 {
        self.coins.max(0.0).floor() as u64
    }

    /// Product of all boosts still running at `now`.
    pub fn boost_multiplier(&self, now: DateTime<Utc>) -> f64 {
        self.active_boosts
            .iter()
            .filter(|b| b.ends_at > now)
            .map(|b| b.multiplier)
            .product()
    }

    fn current_discount(&self) -> Option<&Discount> {
        self.discounts.iter().find(|d| d.uses_left > 0)
    }

    /// Price of the next copy of `id`, after any live discount.
    pub fn price_of(&self, id: &str) -> Option<u64> {
        let upgrade = self.upgrades.get(id)?;
        let cost = upgrade.next_cost();
        Some(match self.current_discount() {
            Some(d) => (cost as f64 * (1.0 - d.percent as f64 / 100.0)).floor() as u64,
            None => cost,
        })
    }

    fn earn(&mut self, amount: f64) {
        if amount <= 0.0 || !amount.is_finite() {
            return;
        }
        self.coins += amount;
        self.total_coins_earned += amount;
    }

    fn spend(&mut self, amount: u64) {
        self.coins = (self.coins - amount as f64).max(0.0);
    }
}

/// Receipt for a successful purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub upgrade_id: String,
    pub cost: u64,
    pub count: u32,
    pub coins_per_second: f64,
}

/// Owns the economy state and its production timer.
#[derive(Debug)]
pub struct Economy {
    state: EconomyState,
    bus: EventBus,
    production_timer: Option<TimerId>,
}

impl Economy {
    pub fn new(bus: EventBus) -> Self {
        Self::from_state(EconomyState::default(), bus)
    }

    /// Restore from a saved state. Upgrades missing from the save are added
    /// from the catalogue, and production is recomputed.
    pub fn from_state(mut state: EconomyState, bus: EventBus) -> Self {
        for (id, upgrade) in catalogue() {
            state.upgrades.entry(id.to_string()).or_insert(upgrade);
        }
        state.coins = state.coins.max(0.0);
        state.recompute_production();
        Self {
            state,
            bus,
            production_timer: None,
        }
    }

    pub fn state(&self) -> &EconomyState {
        &self.state
    }

    /// Owned copy with expired boosts dropped.
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> EconomyState {
        self.prune_boosts(now);
        self.state.clone()
    }

    // ── Timers ───────────────────────────────────────────────────────

    pub fn start(&mut self, scheduler: &mut Scheduler, interval: Duration) {
        if let Some(id) = self.production_timer.take() {
            scheduler.cancel(id);
        }
        self.production_timer = Some(scheduler.every(TimerKind::EconomyProduction, interval));
    }

    pub fn dispose(&mut self, scheduler: &mut Scheduler) {
        if let Some(id) = self.production_timer.take() {
            scheduler.cancel(id);
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn click(&mut self) {
        self.state.total_clicks += 1;
        self.state.earn(1.0);
        self.publish_earned(1.0, EarnSource::Click);
        self.check_achievements();
    }

    pub fn purchase(&mut self, upgrade_id: &str) -> Result<Purchase, PurchaseError> {
        let cost = self
            .state
            .price_of(upgrade_id)
            .ok_or_else(|| PurchaseError::UnknownUpgrade(upgrade_id.to_string()))?;
        if self.state.coins < cost as f64 {
            return Err(PurchaseError::InsufficientCoins {
                needed: cost,
                available: self.state.display_coins(),
            });
        }

        self.state.spend(cost);
        let count = match self.state.upgrades.get_mut(upgrade_id) {
            Some(upgrade) => {
                upgrade.count += 1;
                upgrade.count
            }
            None => return Err(PurchaseError::UnknownUpgrade(upgrade_id.to_string())),
        };
        if let Some(discount) = self.state.discounts.iter_mut().find(|d| d.uses_left > 0) {
            discount.uses_left -= 1;
        }
        self.state.discounts.retain(|d| d.uses_left > 0);
        self.state.recompute_production();

        info!(upgrade_id, cost, count, "upgrade purchased");
        let purchase = Purchase {
            upgrade_id: upgrade_id.to_string(),
            cost,
            count,
            coins_per_second: self.state.coins_per_second,
        };
        self.check_achievements();
        self.bus.publish(Event::UpgradePurchased {
            upgrade_id: purchase.upgrade_id.clone(),
            count,
            cost,
            coins_per_second: purchase.coins_per_second,
        });
        Ok(purchase)
    }

    /// Apply `delta_seconds` of production at the current boost multiplier.
    pub fn tick(&mut self, delta_seconds: f64, now: DateTime<Utc>) -> f64 {
        self.prune_boosts(now);
        let amount =
            self.state.coins_per_second * self.state.boost_multiplier(now) * delta_seconds.max(0.0);
        self.state.earn(amount);
        if amount > 0.0 {
            self.publish_earned(amount, EarnSource::Production);
            self.check_achievements();
        }
        amount
    }

    /// Credit coins earned by other subsystems (focus rewards and the like).
    pub fn grant(&mut self, amount: u64, source: EarnSource) {
        if amount == 0 {
            return;
        }
        self.state.earn(amount as f64);
        self.publish_earned(amount as f64, source);
        self.check_achievements();
    }

    /// Credit production for the time between `saved_at` and `now`, capped
    /// at `cap`. Boosts are not applied to offline time.
    pub fn credit_offline(
        &mut self,
        saved_at: DateTime<Utc>,
        now: DateTime<Utc>,
        cap: Duration,
    ) -> f64 {
        let elapsed = (now - saved_at).clamp(Duration::zero(), cap.max(Duration::zero()));
        let seconds = elapsed.num_milliseconds() as f64 / 1000.0;
        let amount = self.state.coins_per_second * seconds;
        if amount > 0.0 {
            self.state.earn(amount);
            info!(seconds, amount, "credited offline earnings");
            self.publish_earned(amount, EarnSource::Offline);
            self.check_achievements();
        }
        amount
    }

    /// Buy a ticket and pick a prize. Nothing is applied until [`settle`](Self::settle).
    pub fn draw<R: Rng + ?Sized>(
        &mut self,
        tier: LotteryTier,
        rng: &mut R,
    ) -> Result<Prize, LotteryError> {
        let price = tier.price();
        if self.state.coins < price as f64 {
            return Err(LotteryError::InsufficientCoins {
                tier: tier.label().to_string(),
                price,
                available: self.state.display_coins(),
            });
        }
        let table = prize_table(tier);
        let prize = pick(&table, rng)?.prize.clone();
        self.state.spend(price);
        self.state.lottery_draws += 1;
        debug!(?tier, ?prize, "lottery draw");
        self.bus.publish(Event::LotteryDrawn {
            tier,
            prize: prize.clone(),
        });
        self.check_achievements();
        Ok(prize)
    }

    pub fn settle(&mut self, prize: &Prize, now: DateTime<Utc>) {
        match *prize {
            Prize::Coins { amount } => {
                self.state.earn(amount as f64);
                self.publish_earned(amount as f64, EarnSource::Lottery);
            }
            Prize::Boost {
                multiplier,
                duration_secs,
            } => {
                self.state.active_boosts.push(Boost {
                    multiplier,
                    ends_at: i64::try_from(duration_secs)
                        .ok()
                        .and_then(Duration::try_seconds)
                        .and_then(|d| now.checked_add_signed(d))
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                });
            }
            Prize::Discount { percent } => {
                self.state.discounts.push(Discount {
                    percent: percent.min(100),
                    uses_left: DISCOUNT_USES,
                });
            }
        }
        self.bus.publish(Event::LotterySettled {
            prize: prize.clone(),
        });
        self.check_achievements();
    }

    /// Unlock every achievement whose predicate now holds. Returns the newly
    /// unlocked ids; calling again without a state change returns nothing.
    pub fn check_achievements(&mut self) -> Vec<String> {
        let mut unlocked = Vec::new();
        for achievement in ACHIEVEMENTS {
            if self.state.achievements_unlocked.contains(achievement.id) {
                continue;
            }
            if (achievement.unlocked_by)(&self.state) {
                self.state
                    .achievements_unlocked
                    .insert(achievement.id.to_string());
                unlocked.push(achievement.id.to_string());
            }
        }
        for id in &unlocked {
            let name = achievements::find(id).map(|a| a.name).unwrap_or_default();
            info!(achievement = %id, "achievement unlocked");
            self.bus.publish(Event::AchievementUnlocked {
                achievement_id: id.clone(),
                name: name.to_string(),
            });
        }
        unlocked
    }

    fn prune_boosts(&mut self, now: DateTime<Utc>) {
        self.state.active_boosts.retain(|b| b.ends_at > now);
    }

    fn publish_earned(&self, amount: f64, source: EarnSource) {
        self.bus.publish(Event::CoinsEarned {
            amount,
            source,
            balance: self.state.coins,
        });
    }
}
