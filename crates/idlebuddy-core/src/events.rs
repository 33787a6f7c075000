use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::battle::Attribute;
use crate::buddy::{Behavior, InteractAction};
use crate::economy::{EarnSource, LotteryTier, Prize};
use crate::focus::SessionType;

/// Topic names used on the [`EventBus`](crate::EventBus).
pub mod topics {
    pub const COINS_EARNED: &str = "coins:earned";
    pub const UPGRADE_PURCHASED: &str = "upgrade:purchased";
    pub const ACHIEVEMENT_UNLOCKED: &str = "achievement:unlocked";
    pub const LOTTERY_DRAWN: &str = "lottery:drawn";
    pub const LOTTERY_SETTLED: &str = "lottery:settled";

    pub const FOCUS_STARTED: &str = "focus:started";
    pub const FOCUS_PAUSED: &str = "focus:paused";
    pub const FOCUS_RESUMED: &str = "focus:resumed";
    pub const FOCUS_STOPPED: &str = "focus:stopped";
    pub const FOCUS_TICK: &str = "focus:tick";
    pub const FOCUS_COMPLETED: &str = "focus:completed";

    pub const BUDDY_BEHAVIOR_CHANGED: &str = "buddy:behaviorChanged";
    pub const BUDDY_LEVEL_UP: &str = "buddy:levelUp";
    pub const BUDDY_SKIN_UNLOCKED: &str = "buddy:skinUnlocked";
    pub const BUDDY_SKIN_CHANGED: &str = "buddy:skinChanged";
    pub const BUDDY_INTERACTED: &str = "buddy:interacted";

    pub const DDL_ADDED: &str = "ddl:added";
    pub const DDL_COMPLETED: &str = "ddl:completed";
    pub const DDL_DELETED: &str = "ddl:deleted";
    pub const DDL_URGENT: &str = "ddl:urgent";
    pub const DDL_APPROACHING: &str = "ddl:approaching";
    pub const DDL_OVERDUE: &str = "ddl:overdue";

    pub const BATTLE_STARTED: &str = "battle:started";
    pub const BATTLE_STOPPED: &str = "battle:stopped";
    pub const BATTLE_UPGRADED: &str = "battle:upgraded";
    pub const BATTLE_NEXT_WAVE: &str = "battle:nextWave";
    pub const BATTLE_VICTORY: &str = "battle:victory";
    pub const BATTLE_DEFEAT: &str = "battle:defeat";

    pub const ALL: &[&str] = &[
        COINS_EARNED,
        UPGRADE_PURCHASED,
        ACHIEVEMENT_UNLOCKED,
        LOTTERY_DRAWN,
        LOTTERY_SETTLED,
        FOCUS_STARTED,
        FOCUS_PAUSED,
        FOCUS_RESUMED,
        FOCUS_STOPPED,
        FOCUS_TICK,
        FOCUS_COMPLETED,
        BUDDY_BEHAVIOR_CHANGED,
        BUDDY_LEVEL_UP,
        BUDDY_SKIN_UNLOCKED,
        BUDDY_SKIN_CHANGED,
        BUDDY_INTERACTED,
        DDL_ADDED,
        DDL_COMPLETED,
        DDL_DELETED,
        DDL_URGENT,
        DDL_APPROACHING,
        DDL_OVERDUE,
        BATTLE_STARTED,
        BATTLE_STOPPED,
        BATTLE_UPGRADED,
        BATTLE_NEXT_WAVE,
        BATTLE_VICTORY,
        BATTLE_DEFEAT,
    ];
}

/// Every state change in the system produces an Event.
/// Components publish them on the bus; the presentation layer renders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    CoinsEarned {
        amount: f64,
        source: EarnSource,
        balance: f64,
    },
    UpgradePurchased {
        upgrade_id: String,
        count: u32,
        cost: u64,
        coins_per_second: f64,
    },
    AchievementUnlocked {
        achievement_id: String,
        name: String,
    },
    LotteryDrawn {
        tier: LotteryTier,
        prize: Prize,
    },
    LotterySettled {
        prize: Prize,
    },

    FocusStarted {
        session_type: SessionType,
        total_seconds: u32,
    },
    FocusPaused {
        remaining_seconds: u32,
    },
    FocusResumed {
        remaining_seconds: u32,
    },
    FocusStopped {
        session_type: SessionType,
        remaining_seconds: u32,
    },
    FocusTick {
        remaining_seconds: u32,
        total_seconds: u32,
    },
    FocusCompleted {
        session_type: SessionType,
        minutes: u32,
        reward: u64,
        streak: u32,
        next_break_long: bool,
    },

    BuddyBehaviorChanged {
        from: Behavior,
        to: Behavior,
        until: Option<DateTime<Utc>>,
    },
    BuddyLevelUp {
        level: u32,
    },
    BuddySkinUnlocked {
        skin_id: String,
    },
    BuddySkinChanged {
        skin_id: String,
    },
    BuddyInteracted {
        action: InteractAction,
        mood: f64,
        energy: f64,
    },

    DeadlineAdded {
        task_id: String,
        name: String,
        deadline: DateTime<Utc>,
    },
    DeadlineCompleted {
        task_id: String,
        name: String,
    },
    DeadlineDeleted {
        task_id: String,
    },
    DeadlineUrgent {
        task_id: String,
        name: String,
        hours_left: f64,
    },
    DeadlineApproaching {
        task_id: String,
        name: String,
        hours_left: f64,
    },
    DeadlineOverdue {
        task_id: String,
        name: String,
        hours_overdue: f64,
    },

    BattleStarted {
        wave: u32,
        enemies: usize,
    },
    BattleStopped {
        wave: u32,
    },
    BattleUpgraded {
        attribute: Attribute,
        cost: u64,
        gold_left: u64,
    },
    BattleNextWave {
        wave: u32,
    },
    BattleVictory {
        wave: u32,
        gold: u64,
        exp: u64,
    },
    BattleDefeat {
        wave: u32,
    },
}

impl Event {
    /// The bus topic this event is published on.
    pub fn topic(&self) -> &'static str {
        use topics::*;
        match self {
            Event::CoinsEarned { .. } => COINS_EARNED,
            Event::UpgradePurchased { .. } => UPGRADE_PURCHASED,
            Event::AchievementUnlocked { .. } => ACHIEVEMENT_UNLOCKED,
            Event::LotteryDrawn { .. } => LOTTERY_DRAWN,
            Event::LotterySettled { .. } => LOTTERY_SETTLED,
            Event::FocusStarted { .. } => FOCUS_STARTED,
            Event::FocusPaused { .. } => FOCUS_PAUSED,
            Event::FocusResumed { .. } => FOCUS_RESUMED,
            Event::FocusStopped { .. } => FOCUS_STOPPED,
            Event::FocusTick { .. } => FOCUS_TICK,
            Event::FocusCompleted { .. } => FOCUS_COMPLETED,
            Event::BuddyBehaviorChanged { .. } => BUDDY_BEHAVIOR_CHANGED,
            Event::BuddyLevelUp { .. } => BUDDY_LEVEL_UP,
            Event::BuddySkinUnlocked { .. } => BUDDY_SKIN_UNLOCKED,
            Event::BuddySkinChanged { .. } => BUDDY_SKIN_CHANGED,
            Event::BuddyInteracted { .. } => BUDDY_INTERACTED,
            Event::DeadlineAdded { .. } => DDL_ADDED,
            Event::DeadlineCompleted { .. } => DDL_COMPLETED,
            Event::DeadlineDeleted { .. } => DDL_DELETED,
            Event::DeadlineUrgent { .. } => DDL_URGENT,
            Event::DeadlineApproaching { .. } => DDL_APPROACHING,
            Event::DeadlineOverdue { .. } => DDL_OVERDUE,
            Event::BattleStarted { .. } => BATTLE_STARTED,
            Event::BattleStopped { .. } => BATTLE_STOPPED,
            Event::BattleUpgraded { .. } => BATTLE_UPGRADED,
            Event::BattleNextWave { .. } => BATTLE_NEXT_WAVE,
            Event::BattleVictory { .. } => BATTLE_VICTORY,
            Event::BattleDefeat { .. } => BATTLE_DEFEAT,
        }
    }
}
