use clap::Subcommand;
use idlebuddy_core::{Attribute, Command};

use crate::session::{self, print_json, Session};

#[derive(Subcommand)]
pub enum BattleAction {
    /// Start a wave (the current one by default)
    Start {
        #[arg(long)]
        wave: Option<u32>,
    },
    /// Stop the running battle
    Stop,
    /// Start the next wave after a victory
    Next,
    /// Spend gold on an attribute
    Upgrade {
        /// attack, defense, max-health, crit-rate, crit-damage or health-regen
        attribute: Attribute,
        /// Gold to spend
        #[arg(long, default_value = "10")]
        cost: u64,
    },
    /// Print the battle state as JSON
    Status,
    /// Print the most recent log entries
    Log,
}

pub fn run(action: BattleAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        BattleAction::Start { wave } => session::execute(Command::StartBattle { wave }),
        BattleAction::Stop => session::execute(Command::StopBattle),
        BattleAction::Next => session::execute(Command::BattleNextWave),
        BattleAction::Upgrade { attribute, cost } => {
            session::execute(Command::BattleUpgrade { attribute, cost })
        }
        BattleAction::Status => {
            let mut session = Session::open()?;
            let battle = session.game().battle_state();
            session.close()?;
            print_json(&battle)
        }
        BattleAction::Log => {
            let mut session = Session::open()?;
            let log = session.game().battle_log();
            session.close()?;
            print_json(&log)
        }
    }
}
