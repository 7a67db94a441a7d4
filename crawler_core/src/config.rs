//! Tunable game constants.
//!
//! Every value has a default so a partial JSON document only needs to name the
//! fields it overrides.

use serde::{Deserialize, Serialize};

use crate::Millis;

/// A configuration value the game cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid config value `{field}`: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: &'static str,
}

fn check(ok: bool, field: &'static str, reason: &'static str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError { field, reason })
    }
}

/// Top-level configuration handed to the world at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Edge length of one grid tile in world units.
    pub tile_size: i32,
    /// Seed for every enemy's wander generator.
    pub seed: u64,
    pub enemy: EnemyConfig,
    pub player: PlayerConfig,
    pub separation: SeparationConfig,
}

impl GameConfig {
    /// Rejects values that would make grid maths or random draws impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(self.tile_size > 0, "tile_size", "must be positive")?;

        let enemy = &self.enemy;
        check(enemy.width > 0, "enemy.width", "must be positive")?;
        check(enemy.height > 0, "enemy.height", "must be positive")?;
        check(
            enemy.speed.is_finite() && enemy.speed >= 0.0,
            "enemy.speed",
            "must be a non-negative number",
        )?;
        check(enemy.wander_radius >= 0, "enemy.wander_radius", "must not be negative")?;
        check(
            enemy.wander_interval_ms.0 <= enemy.wander_interval_ms.1,
            "enemy.wander_interval_ms",
            "lower bound exceeds upper bound",
        )?;

        check(self.player.width > 0, "player.width", "must be positive")?;
        check(self.player.height > 0, "player.height", "must be positive")?;
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            tile_size: 32,
            seed: 0x5eed,
            enemy: EnemyConfig::default(),
            player: PlayerConfig::default(),
            separation: SeparationConfig::default(),
        }
    }
}

/// Behaviour parameters shared by every enemy of a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    pub width: i32,
    pub height: i32,
    pub max_health: i32,
    /// Movement speed in world units per second.
    pub speed: f32,
    pub detection_radius: f32,
    pub attack_range: f32,
    pub attack_damage: i32,
    pub attack_cooldown_ms: Millis,
    /// How long the attack hitbox stays visible after a swing.
    pub attack_hitbox_ms: Millis,
    /// Time after losing the player before a search is abandoned.
    pub lose_sight_ms: Millis,
    /// Invulnerability window after taking a hit.
    pub hurt_ms: Millis,
    /// Inclusive range the wander pause is drawn from.
    pub wander_interval_ms: (Millis, Millis),
    pub wander_radius: i32,
    pub wander_max_depth: u32,
    pub wander_attempts: u32,
    pub astar_max_expansions: u32,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        EnemyConfig {
            width: 24,
            height: 24,
            max_health: 3,
            speed: 110.0,
            detection_radius: 350.0,
            attack_range: 40.0,
            attack_damage: 1,
            attack_cooldown_ms: 800,
            attack_hitbox_ms: 150,
            lose_sight_ms: 3000,
            hurt_ms: 500,
            wander_interval_ms: (1200, 2500),
            wander_radius: 3,
            wander_max_depth: 8,
            wander_attempts: 24,
            astar_max_expansions: 512,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub width: i32,
    pub height: i32,
    pub max_health: i32,
    /// Distance covered by one movement step.
    pub step: i32,
    pub damage: i32,
    pub attack_cooldown_ms: Millis,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            width: 24,
            height: 24,
            max_health: 5,
            step: 8,
            damage: 1,
            attack_cooldown_ms: 500,
        }
    }
}

/// Soft repulsion between enemies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    pub strength: f32,
    pub radius: f32,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        SeparationConfig {
            strength: 0.4,
            radius: 40.0,
        }
    }
}
