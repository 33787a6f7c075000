use serde::{Deserialize, Serialize};

use super::BuddyStats;

pub const DEFAULT_SKIN: &str = "classic";

/// Stat a skin unlock condition is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkinStat {
    FocusMinutes,
    CodingDays,
    TotalLines,
    DdlsCompleted,
    Streak,
}

impl SkinStat {
    pub fn read(self, stats: &BuddyStats) -> u64 {
        match self {
            SkinStat::FocusMinutes => stats.focus_minutes,
            SkinStat::CodingDays => stats.coding_days as u64,
            SkinStat::TotalLines => stats.total_lines,
            SkinStat::DdlsCompleted => stats.ddls_completed as u64,
            SkinStat::Streak => stats.streak as u64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Skin {
    pub id: &'static str,
    pub name: &'static str,
    /// `None` for skins available from the start.
    pub unlock: Option<(SkinStat, u64)>,
}

pub const SKINS: &[Skin] = &[
    Skin {
        id: DEFAULT_SKIN,
        name: "Classic",
        unlock: None,
    },
    Skin {
        id: "ninja",
        name: "Focus Ninja",
        unlock: Some((SkinStat::FocusMinutes, 300)),
    },
    Skin {
        id: "nightOwl",
        name: "Night Owl",
        unlock: Some((SkinStat::CodingDays, 7)),
    },
    Skin {
        id: "robot",
        name: "Code Robot",
        unlock: Some((SkinStat::TotalLines, 10_000)),
    },
    Skin {
        id: "wizard",
        name: "Deadline Wizard",
        unlock: Some((SkinStat::DdlsCompleted, 10)),
    },
    Skin {
        id: "phoenix",
        name: "Phoenix",
        unlock: Some((SkinStat::Streak, 8)),
    },
];

pub fn find(id: &str) -> Option<&'static Skin> {
    SKINS.iter().find(|s| s.id == id)
}
