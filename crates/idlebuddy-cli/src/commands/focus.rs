use chrono::Utc;
use clap::Subcommand;
use idlebuddy_core::Command;

use crate::session::{self, print_json, Session};

#[derive(Subcommand)]
pub enum FocusAction {
    /// Start a work session
    Start {
        /// Session length (defaults to the configured work length)
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Start a break
    Break {
        /// Force a long break (otherwise chosen by the streak)
        #[arg(long)]
        long: bool,
        /// Force a short break
        #[arg(long, conflicts_with = "long")]
        short: bool,
    },
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Abandon the current session
    Stop,
    /// Print the current session as JSON
    Status,
    /// Recently completed sessions
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Completed session statistics
    Stats,
}

pub fn run(action: FocusAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        FocusAction::Start { minutes } => session::execute(Command::StartFocusWork { minutes }),
        FocusAction::Break { long, short } => {
            let long = match (long, short) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            session::execute(Command::StartFocusBreak { long })
        }
        FocusAction::Pause => session::execute(Command::PauseFocus),
        FocusAction::Resume => session::execute(Command::ResumeFocus),
        FocusAction::Stop => session::execute(Command::StopFocus),
        FocusAction::Status => {
            let mut session = Session::open()?;
            let focus = session.game().focus_state();
            session.close()?;
            print_json(&focus)
        }
        FocusAction::History { limit } => {
            let session = Session::open()?;
            let sessions = session.db().recent_sessions(limit)?;
            session.close()?;
            print_json(&sessions)
        }
        FocusAction::Stats => {
            let session = Session::open()?;
            let stats = session.db().stats_all(Utc::now().date_naive())?;
            session.close()?;
            print_json(&stats)
        }
    }
}
