//! Lottery prize tables and weighted draw.
//!
//! Drawing and settling are separate steps: [`draw`] picks a prize instantly,
//! and the economy applies it later in `Economy::settle`. Any reveal
//! animation lives between the two calls, in the presentation layer.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::LotteryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotteryTier {
    Bronze,
    Silver,
    Gold,
}

impl LotteryTier {
    pub fn price(self) -> u64 {
        match self {
            LotteryTier::Bronze => 100,
            LotteryTier::Silver => 500,
            LotteryTier::Gold => 2_000,
        }
    }

    /// Scales every coin and duration prize of the tier.
    fn scale(self) -> f64 {
        match self {
            LotteryTier::Bronze => 1.0,
            LotteryTier::Silver => 5.0,
            LotteryTier::Gold => 20.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LotteryTier::Bronze => "bronze",
            LotteryTier::Silver => "silver",
            LotteryTier::Gold => "gold",
        }
    }
}

impl std::str::FromStr for LotteryTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bronze" => Ok(LotteryTier::Bronze),
            "silver" => Ok(LotteryTier::Silver),
            "gold" => Ok(LotteryTier::Gold),
            other => Err(format!("unknown lottery tier: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prize {
    Coins { amount: u64 },
    Boost { multiplier: f64, duration_secs: u64 },
    Discount { percent: u8 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrizeEntry {
    pub weight: f64,
    pub prize: Prize,
}

/// The prize table for a tier. Weights sum to 100.
pub fn prize_table(tier: LotteryTier) -> Vec<PrizeEntry> {
    let k = tier.scale();
    let coins = |base: f64| Prize::Coins {
        amount: (base * k) as u64,
    };
    vec![
        PrizeEntry {
            weight: 40.0,
            prize: coins(50.0),
        },
        PrizeEntry {
            weight: 25.0,
            prize: coins(150.0),
        },
        PrizeEntry {
            weight: 15.0,
            prize: Prize::Boost {
                multiplier: 2.0,
                duration_secs: (60.0 * k) as u64,
            },
        },
        PrizeEntry {
            weight: 10.0,
            prize: Prize::Discount { percent: 20 },
        },
        PrizeEntry {
            weight: 7.0,
            prize: coins(500.0),
        },
        PrizeEntry {
            weight: 3.0,
            prize: Prize::Boost {
                multiplier: 5.0,
                duration_secs: (30.0 * k) as u64,
            },
        },
    ]
}

/// Weighted pick by cumulative subtraction over a uniform sample in
/// `[0, total_weight)`. Falls back to the first entry if rounding leaves the
/// sample unconsumed.
pub fn pick<'a, R: Rng + ?Sized>(
    table: &'a [PrizeEntry],
    rng: &mut R,
) -> Result<&'a PrizeEntry, LotteryError> {
    let first = table.first().ok_or(LotteryError::EmptyPrizeTable)?;
    let total: f64 = table.iter().map(|e| e.weight).sum();
    if total <= 0.0 {
        return Ok(first);
    }
    let mut roll = rng.gen_range(0.0..total);
    for entry in table {
        roll -= entry.weight;
        if roll < 0.0 {
            return Ok(entry);
        }
    }
    Ok(first)
}
