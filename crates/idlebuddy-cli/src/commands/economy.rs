use idlebuddy_core::{Command, LotteryTier};

use crate::session;

pub fn click(times: u32) -> Result<(), Box<dyn std::error::Error>> {
    let clicks = (0..times.max(1)).map(|_| Command::Click).collect();
    session::execute_all(clicks)
}

pub fn buy(upgrade_id: String) -> Result<(), Box<dyn std::error::Error>> {
    session::execute(Command::Purchase { upgrade_id })
}

/// A single invocation cannot leave a prize pending, so draw and settle
/// happen together.
pub fn lottery(tier: LotteryTier) -> Result<(), Box<dyn std::error::Error>> {
    session::execute_all(vec![Command::Lottery { tier }, Command::Settle])
}
