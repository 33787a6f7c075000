use super::character::{BattleCharacter, Position, ARENA_SIZE};

/// Most enemies a single wave can field.
pub const MAX_ENEMIES: u32 = 5;

/// Base stats for one enemy tier.
#[derive(Debug, Clone, Copy)]
pub struct EnemyTier {
    pub name: &'static str,
    pub health: f64,
    pub attack: f64,
    pub defense: f64,
    pub speed: f64,
}

pub const ENEMY_TIERS: &[EnemyTier] = &[
    EnemyTier {
        name: "Slime",
        health: 50.0,
        attack: 8.0,
        defense: 2.0,
        speed: 5.0,
    },
    EnemyTier {
        name: "Goblin",
        health: 80.0,
        attack: 12.0,
        defense: 4.0,
        speed: 8.0,
    },
    EnemyTier {
        name: "Orc",
        health: 150.0,
        attack: 18.0,
        defense: 8.0,
        speed: 6.0,
    },
    EnemyTier {
        name: "Troll",
        health: 250.0,
        attack: 25.0,
        defense: 12.0,
        speed: 4.0,
    },
    EnemyTier {
        name: "Dragon",
        health: 500.0,
        attack: 40.0,
        defense: 20.0,
        speed: 10.0,
    },
];

/// `floor(wave / 3)`, clamped to the strongest tier.
pub fn tier_for_wave(wave: u32) -> &'static EnemyTier {
    let index = ((wave / 3) as usize).min(ENEMY_TIERS.len() - 1);
    &ENEMY_TIERS[index]
}

/// `1 + (wave - 1) * 0.1`
pub fn wave_scale(wave: u32) -> f64 {
    1.0 + wave.saturating_sub(1) as f64 * 0.1
}

/// `min(1 + floor(wave / 2), 5)`
pub fn enemy_count(wave: u32) -> u32 {
    (1 + wave / 2).min(MAX_ENEMIES)
}

/// Enemies for a wave, lined up on the far side of the arena.
pub fn spawn_wave(wave: u32) -> Vec<BattleCharacter> {
    let tier = tier_for_wave(wave);
    let scale = wave_scale(wave);
    let count = enemy_count(wave);
    let spacing = 15.0;
    let first_y = ARENA_SIZE / 2.0 - spacing * (count - 1) as f64 / 2.0;

    (0..count)
        .map(|i| {
            let scaled = |base: f64| (base * scale + 1e-9).floor();
            let health = scaled(tier.health);
            BattleCharacter {
                name: format!("{} #{}", tier.name, i + 1),
                health,
                max_health: health,
                attack: scaled(tier.attack),
                defense: scaled(tier.defense),
                crit_rate: 0.0,
                crit_damage: 1.0,
                health_regen: 0.0,
                speed: tier.speed,
                position: Position::new(90.0, first_y + spacing * i as f64),
            }
        })
        .collect()
}
