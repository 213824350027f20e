//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::game::command::Timing;

/// Match configuration loaded from environment variables
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Grid size in cells
    pub arena_width: i32,
    pub arena_height: i32,

    /// Character identities; display names are derived from these
    pub player_one: String,
    pub player_two: String,

    /// Combatant footprint in cells
    pub character_width: i32,
    pub character_height: i32,
    /// Gap between each combatant and its wall at round start
    pub spawn_offset: i32,

    pub jump_height: u32,
    pub jump_step_ms: u64,
    pub fire_step_ms: u64,
    pub kick_duration_ms: u64,
    pub hit_duration_ms: u64,
    pub throw_height: u32,
    pub throw_step_ms: u64,
    pub throw_release_ms: u64,

    /// Kick/Fire/Throw intents allowed per player per second
    pub attacks_per_second: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            arena_width: 40,
            arena_height: 20,
            player_one: "zhenia".to_string(),
            player_two: "dino".to_string(),
            character_width: 4,
            character_height: 6,
            spawn_offset: 2,
            jump_height: 10,
            jump_step_ms: 100,
            fire_step_ms: 100,
            kick_duration_ms: 1000,
            hit_duration_ms: 1000,
            throw_height: 4,
            throw_step_ms: 80,
            throw_release_ms: 300,
            attacks_per_second: 2,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build a configuration from any variable source; unset variables keep
    /// their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),

            arena_width: parse(&lookup, "ARENA_WIDTH", defaults.arena_width)?,
            arena_height: parse(&lookup, "ARENA_HEIGHT", defaults.arena_height)?,

            player_one: lookup("PLAYER_ONE_NAME").unwrap_or(defaults.player_one),
            player_two: lookup("PLAYER_TWO_NAME").unwrap_or(defaults.player_two),

            character_width: parse(&lookup, "CHARACTER_WIDTH", defaults.character_width)?,
            character_height: parse(&lookup, "CHARACTER_HEIGHT", defaults.character_height)?,
            spawn_offset: parse(&lookup, "SPAWN_OFFSET", defaults.spawn_offset)?,

            jump_height: parse(&lookup, "JUMP_HEIGHT", defaults.jump_height)?,
            jump_step_ms: parse(&lookup, "JUMP_STEP_MS", defaults.jump_step_ms)?,
            fire_step_ms: parse(&lookup, "FIRE_STEP_MS", defaults.fire_step_ms)?,
            kick_duration_ms: parse(&lookup, "KICK_DURATION_MS", defaults.kick_duration_ms)?,
            hit_duration_ms: parse(&lookup, "HIT_DURATION_MS", defaults.hit_duration_ms)?,
            throw_height: parse(&lookup, "THROW_HEIGHT", defaults.throw_height)?,
            throw_step_ms: parse(&lookup, "THROW_STEP_MS", defaults.throw_step_ms)?,
            throw_release_ms: parse(&lookup, "THROW_RELEASE_MS", defaults.throw_release_ms)?,

            attacks_per_second: parse(
                &lookup,
                "ATTACKS_PER_SECOND",
                defaults.attacks_per_second,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("CHARACTER_WIDTH", self.character_width),
            ("CHARACTER_HEIGHT", self.character_height),
        ];
        for (var, value) in positive {
            if value <= 0 {
                return Err(ConfigError::Invalid {
                    var,
                    value: value.to_string(),
                });
            }
        }
        if self.spawn_offset < 0 {
            return Err(ConfigError::Invalid {
                var: "SPAWN_OFFSET",
                value: self.spawn_offset.to_string(),
            });
        }

        let needed_width = 2 * (self.character_width + self.spawn_offset);
        if self.arena_width < needed_width || self.arena_height < self.character_height {
            return Err(ConfigError::ArenaTooSmall {
                width: self.arena_width,
                height: self.arena_height,
                needed_width,
                needed_height: self.character_height,
            });
        }
        Ok(())
    }

    pub fn timing(&self) -> Timing {
        Timing {
            jump_height: self.jump_height,
            jump_step: Duration::from_millis(self.jump_step_ms),
            fire_step: Duration::from_millis(self.fire_step_ms),
            kick_duration: Duration::from_millis(self.kick_duration_ms),
            hit_duration: Duration::from_millis(self.hit_duration_ms),
            throw_height: self.throw_height,
            throw_step: Duration::from_millis(self.throw_step_ms),
            throw_release: Duration::from_millis(self.throw_release_ms),
        }
    }
}

fn parse<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("Arena {width}x{height} cannot hold both combatants (needs at least {needed_width}x{needed_height})")]
    ArenaTooSmall {
        width: i32,
        height: i32,
        needed_width: i32,
        needed_height: i32,
    },
}
