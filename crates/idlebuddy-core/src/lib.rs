//! # idlebuddy Core Library
//!
//! This library provides the core logic of idlebuddy, a coding companion that
//! turns work into an idle game. Every operation is available through the
//! standalone `idlebuddy` CLI, which is only a thin presentation layer over
//! this crate.
//!
//! ## Architecture
//!
//! - **Event bus**: synchronous publish/subscribe hub; all cross-component
//!   coordination flows through it
//! - **Scheduler**: virtual clock owning every periodic tick and delayed
//!   transition as a cancellable timer
//! - **State machines**: economy, focus timer, buddy, deadline tracker and
//!   battle, each owning its own state
//! - **Storage**: key-value persistence (SQLite or in memory) and TOML
//!   configuration
//!
//! ## Key Components
//!
//! - [`Game`]: composition root executing [`Command`]s and advancing time
//! - [`EventBus`]: topic-based dispatch of [`Event`]s
//! - [`Scheduler`]: timers in virtual time
//! - [`Persistence`]: trait for save stores

pub mod battle;
pub mod buddy;
pub mod bus;
pub mod deadline;
pub mod economy;
pub mod error;
pub mod events;
pub mod focus;
pub mod game;
pub mod scheduler;
pub mod storage;

pub use battle::{Attribute, BattlePhase, BattleState, BattleSystem};
pub use buddy::{Behavior, Buddy, BuddyState, CodeDelta, InteractAction};
pub use bus::{EventBus, Subscription};
pub use deadline::{DeadlineTask, DeadlineTracker};
pub use economy::{Economy, EconomyState, LotteryTier, Prize};
pub use error::{CoreError, PersistenceError};
pub use events::Event;
pub use focus::{FocusSession, FocusState, FocusTimer, SessionType};
pub use game::{Command, Game, GameSnapshot, Outcome};
pub use scheduler::{Scheduler, TimerId, TimerKind};
pub use storage::{Config, Database, MemoryStore, Persistence};
