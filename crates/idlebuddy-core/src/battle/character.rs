use rand::Rng;
use serde::{Deserialize, Serialize};

/// Side length of the square arena.
pub const ARENA_SIZE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(0.0, ARENA_SIZE),
            y: y.clamp(0.0, ARENA_SIZE),
        }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleCharacter {
    pub name: String,
    pub health: f64,
    pub max_health: f64,
    pub attack: f64,
    pub defense: f64,
    /// 0.0 - 1.0
    pub crit_rate: f64,
    /// Multiplier applied on a critical hit, at least 1.0.
    pub crit_damage: f64,
    pub health_regen: f64,
    /// Maximum distance covered per combat round.
    pub speed: f64,
    pub position: Position,
}

impl BattleCharacter {
    pub fn player() -> Self {
        Self {
            name: "Hero".into(),
            health: 100.0,
            max_health: 100.0,
            attack: 15.0,
            defense: 5.0,
            crit_rate: 0.1,
            crit_damage: 1.5,
            health_regen: 1.0,
            speed: 10.0,
            position: Position::new(10.0, 50.0),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Step toward `target`, stopping at `range` and never moving more than
    /// `speed`.
    pub fn approach(&mut self, target: &Position, range: f64) {
        let dist = self.position.distance_to(target);
        if dist <= range || dist == 0.0 {
            return;
        }
        let step = self.speed.min(dist - range);
        let ratio = step / dist;
        self.position = Position::new(
            self.position.x + (target.x - self.position.x) * ratio,
            self.position.y + (target.y - self.position.y) * ratio,
        );
    }

    /// Returns the health actually lost.
    pub fn take_damage(&mut self, amount: f64) -> f64 {
        let before = self.health;
        self.health = (self.health - amount.max(0.0)).max(0.0);
        before - self.health
    }

    pub fn heal(&mut self, amount: f64) {
        if self.is_dead() {
            return;
        }
        self.health = (self.health + amount.max(0.0)).min(self.max_health);
    }

    /// Keep every stat inside its documented range.
    pub fn normalize(&mut self) {
        self.max_health = self.max_health.max(1.0);
        self.health = self.health.clamp(0.0, self.max_health);
        self.crit_rate = self.crit_rate.clamp(0.0, 1.0);
        self.crit_damage = self.crit_damage.max(1.0);
        self.health_regen = self.health_regen.max(0.0);
        self.position = Position::new(self.position.x, self.position.y);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub damage: f64,
    pub crit: bool,
}

/// `max(1, atk - def)`, times `crit_damage` on a crit, times a uniform
/// `1 ± jitter` factor, floored.
pub fn roll_damage<R: Rng + ?Sized>(
    attacker: &BattleCharacter,
    defender: &BattleCharacter,
    jitter: f64,
    rng: &mut R,
) -> Hit {
    let mut damage = (attacker.attack - defender.defense).max(1.0);
    let crit = rng.gen::<f64>() < attacker.crit_rate;
    if crit {
        damage *= attacker.crit_damage;
    }
    if jitter > 0.0 {
        damage *= 1.0 + rng.gen_range(-jitter..=jitter);
    }
    Hit {
        damage: damage.floor().max(0.0),
        crit,
    }
}
