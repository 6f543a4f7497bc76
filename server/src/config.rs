//! Server configuration: network settings plus combat tuning.
//!
//! Values come from an optional TOML file; every key is optional and falls
//! back to the defaults in `duel_shared`. Command line flags override the file.

use crate::error::ConfigError;
use duel_shared::{Role, Vector2};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Gameplay numbers the simulation reads. Times are seconds, distances are
/// world units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    pub move_speed: f32,
    pub jump_force: f32,
    pub gravity: f32,
    pub max_health: f32,
    pub attack_cooldown: f32,
    pub combo_window: f32,
    pub stage_damage: [f32; 3],
    pub invincibility_duration: f32,
    pub attack_reach: f32,
    pub attack_box: Vector2,
    pub body_size: Vector2,
    pub host_spawn: Vector2,
    pub challenger_spawn: Vector2,
    pub floor_y: f32,
    pub arena_half_width: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        CombatTuning {
            move_speed: duel_shared::MOVE_SPEED,
            jump_force: duel_shared::JUMP_FORCE,
            gravity: duel_shared::GRAVITY,
            max_health: duel_shared::MAX_HEALTH,
            attack_cooldown: duel_shared::ATTACK_COOLDOWN,
            combo_window: duel_shared::COMBO_WINDOW,
            stage_damage: duel_shared::STAGE_DAMAGE,
            invincibility_duration: duel_shared::INVINCIBILITY_DURATION,
            attack_reach: duel_shared::ATTACK_REACH,
            attack_box: duel_shared::ATTACK_BOX_SIZE,
            body_size: duel_shared::BODY_SIZE,
            host_spawn: duel_shared::HOST_SPAWN,
            challenger_spawn: duel_shared::CHALLENGER_SPAWN,
            floor_y: duel_shared::FLOOR_Y,
            arena_half_width: duel_shared::ARENA_HALF_WIDTH,
        }
    }
}

impl CombatTuning {
    pub fn spawn_point(&self, role: Role) -> Vector2 {
        match role {
            Role::Host => self.host_spawn,
            Role::Challenger => self.challenger_spawn,
        }
    }

    /// Damage for combo stage 1..=3; anything else deals nothing.
    pub fn damage_for(&self, stage: u8) -> f32 {
        match stage {
            1..=3 => self.stage_damage[(stage - 1) as usize],
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Simulation steps per second.
    pub tick_rate: u32,
    pub max_players: usize,
    pub client_timeout_secs: u64,
    pub tuning: CombatTuning,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tick_rate: 60,
            max_players: 2,
            client_timeout_secs: 10,
            tuning: CombatTuning::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive".into()));
        }
        if self.max_players == 0 {
            return Err(ConfigError::Invalid("max_players must be at least 1".into()));
        }
        let t = &self.tuning;
        if t.max_health <= 0.0 {
            return Err(ConfigError::Invalid("max_health must be positive".into()));
        }
        if t.attack_cooldown < 0.0 || t.combo_window < 0.0 || t.invincibility_duration < 0.0 {
            return Err(ConfigError::Invalid("durations cannot be negative".into()));
        }
        if t.stage_damage.iter().any(|d| *d < 0.0) {
            return Err(ConfigError::Invalid("stage damage cannot be negative".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shared_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.max_players, 2);
        assert_eq!(config.tuning.max_health, 100.0);
        assert_eq!(config.tuning.attack_cooldown, 0.25);
        assert_eq!(config.tuning.combo_window, 1.0);
        assert_eq!(config.tuning.spawn_point(Role::Host), Vector2::new(-7.5, 2.5));
        assert_eq!(
            config.tuning.spawn_point(Role::Challenger),
            Vector2::new(7.5, 2.5)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            port = 9000

            [tuning]
            move_speed = 7.5
            host_spawn = { x = -1.0, y = 2.5 }
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.tuning.move_speed, 7.5);
        assert_eq!(config.tuning.host_spawn, Vector2::new(-1.0, 2.5));
        assert_eq!(config.tuning.jump_force, duel_shared::JUMP_FORCE);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ServerConfig::from_toml_str("tick_rate = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ServerConfig::from_toml_str("[tuning]\nmax_health = -5.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = ServerConfig::from_toml_str("port = \"not a number\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_damage_table() {
        let tuning = CombatTuning::default();
        assert_eq!(tuning.damage_for(1), 10.0);
        assert_eq!(tuning.damage_for(2), 15.0);
        assert_eq!(tuning.damage_for(3), 20.0);
        assert_eq!(tuning.damage_for(0), 0.0);
    }

    #[test]
    fn test_tick_duration() {
        let config = ServerConfig {
            tick_rate: 50,
            ..ServerConfig::default()
        };
        assert_eq!(config.tick_duration(), Duration::from_millis(20));
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }
}
