use super::EconomyState;

/// An achievement and its unlock predicate. Predicates are pure functions of
/// the economy state.
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub unlocked_by: fn(&EconomyState) -> bool,
}

fn owned(state: &EconomyState, id: &str) -> u32 {
    state.upgrades.get(id).map(|u| u.count).unwrap_or(0)
}

pub const ACHIEVEMENTS: &[Achievement] = &[
    Achievement {
        id: "firstClick",
        name: "Hello, World",
        unlocked_by: |s| s.total_clicks >= 1,
    },
    Achievement {
        id: "hundredClicks",
        name: "Clicker",
        unlocked_by: |s| s.total_clicks >= 100,
    },
    Achievement {
        id: "firstUpgrade",
        name: "Investor",
        unlocked_by: |s| s.upgrades.values().any(|u| u.count >= 1),
    },
    Achievement {
        id: "tenMiners",
        name: "Mining Crew",
        unlocked_by: |s| owned(s, "basicMiner") >= 10,
    },
    Achievement {
        id: "hundredCoins",
        name: "Pocket Money",
        unlocked_by: |s| s.total_coins_earned >= 100.0,
    },
    Achievement {
        id: "thousandCoins",
        name: "Savings Account",
        unlocked_by: |s| s.total_coins_earned >= 1_000.0,
    },
    Achievement {
        id: "millionCoins",
        name: "Millionaire",
        unlocked_by: |s| s.total_coins_earned >= 1_000_000.0,
    },
    Achievement {
        id: "hundredPerSecond",
        name: "Passive Income",
        unlocked_by: |s| s.coins_per_second >= 100.0,
    },
    Achievement {
        id: "firstLottery",
        name: "Feeling Lucky",
        unlocked_by: |s| s.lottery_draws >= 1,
    },
];

pub fn find(id: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}
