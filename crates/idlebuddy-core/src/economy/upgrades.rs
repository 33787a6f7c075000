use serde::{Deserialize, Serialize};

/// Growth factor applied to an upgrade's cost for every copy already owned.
pub const COST_GROWTH: f64 = 1.15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upgrade {
    pub name: String,
    pub count: u32,
    pub base_cost: u64,
    /// Coins per second contributed by each copy.
    pub production: f64,
}

impl Upgrade {
    pub fn new(name: &str, base_cost: u64, production: f64) -> Self {
        Self {
            name: name.to_string(),
            count: 0,
            base_cost,
            production,
        }
    }

    /// `floor(base_cost * 1.15^count)`
    pub fn next_cost(&self) -> u64 {
        (self.base_cost as f64 * COST_GROWTH.powi(self.count as i32)).floor() as u64
    }

    pub fn total_production(&self) -> f64 {
        self.count as f64 * self.production
    }
}

/// The default upgrade catalogue, keyed by id.
pub fn catalogue() -> Vec<(&'static str, Upgrade)> {
    vec![
        ("basicMiner", Upgrade::new("Basic Miner", 10, 1.0)),
        ("advancedMiner", Upgrade::new("Advanced Miner", 100, 5.0)),
        ("coinFactory", Upgrade::new("Coin Factory", 1_000, 20.0)),
        ("quantumRig", Upgrade::new("Quantum Rig", 10_000, 100.0)),
        ("aiAssistant", Upgrade::new("AI Assistant", 100_000, 500.0)),
    ]
}
