use clap::Subcommand;
use idlebuddy_core::{CodeDelta, Command, InteractAction};

use crate::session::{self, print_json, Session};

#[derive(Subcommand)]
pub enum BuddyAction {
    /// Pet the buddy
    Pet,
    /// Feed the buddy
    Feed,
    /// Play with the buddy
    Play,
    /// Wear an unlocked skin
    Skin {
        /// Skin ID
        skin_id: String,
    },
    /// Report edited lines of code
    Code {
        /// Lines changed
        lines: u32,
        /// File the edit happened in
        #[arg(long)]
        file: Option<String>,
    },
    /// Print the buddy state as JSON
    Status,
}

pub fn run(action: BuddyAction) -> Result<(), Box<dyn std::error::Error>> {
    let interact = |action| session::execute(Command::InteractWithBuddy { action });
    match action {
        BuddyAction::Pet => interact(InteractAction::Pet),
        BuddyAction::Feed => interact(InteractAction::Feed),
        BuddyAction::Play => interact(InteractAction::Play),
        BuddyAction::Skin { skin_id } => session::execute(Command::ChangeSkin { skin_id }),
        BuddyAction::Code { lines, file } => session::execute(Command::CodeChanged {
            delta: CodeDelta { lines, file },
        }),
        BuddyAction::Status => {
            let mut session = Session::open()?;
            let buddy = session.game().buddy_state();
            session.close()?;
            print_json(&buddy)
        }
    }
}
