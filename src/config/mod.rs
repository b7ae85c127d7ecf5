//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub supabase_service_role_key: String,

    /// Allowed client origin(s) for CORS, comma-separated
    pub client_origin: String,

    /// Simulation constants
    pub game: GameConfig,
}

/// Static simulation configuration. All fields have defaults and can be
/// overridden individually via environment variables.
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Simulation ticks per second
    pub tick_rate_hz: u32,
    /// Arena width in world units
    pub map_width: f32,
    /// Arena height in world units
    pub map_height: f32,
    /// Player-vs-player hit distance
    pub collision_radius: f32,
    /// Damage per charge hit on a player
    pub charge_damage: f32,
    /// Damage per charge hit on an environment object
    pub env_damage: f32,
    /// Delay before a destroyed object reappears
    pub respawn_delay_ms: u64,
    /// Score bonus for defeating a player (not counted as damage dealt)
    pub defeat_bonus: f32,
}

/// Smallest accepted arena side. Spawns and movement targets keep a margin
/// from the fence, so the arena must leave real room between the margins.
pub const MIN_MAP_EXTENT: f32 = 400.0;

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            map_width: 2000.0,
            map_height: 2000.0,
            collision_radius: 50.0,
            charge_damage: 25.0,
            env_damage: 10.0,
            respawn_delay_ms: 30_000,
            defeat_bonus: 50.0,
        }
    }
}

impl GameConfig {
    /// Load simulation constants, falling back to defaults per field
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let game = Self {
            tick_rate_hz: env_or("TICK_RATE_HZ", defaults.tick_rate_hz)?,
            map_width: env_or("MAP_WIDTH", defaults.map_width)?,
            map_height: env_or("MAP_HEIGHT", defaults.map_height)?,
            collision_radius: env_or("COLLISION_RADIUS", defaults.collision_radius)?,
            charge_damage: env_or("CHARGE_DAMAGE", defaults.charge_damage)?,
            env_damage: env_or("ENV_DAMAGE", defaults.env_damage)?,
            respawn_delay_ms: env_or("RESPAWN_DELAY_MS", defaults.respawn_delay_ms)?,
            defeat_bonus: env_or("DEFEAT_BONUS", defaults.defeat_bonus)?,
        };
        game.validate()?;
        Ok(game)
    }

    /// Reject constant combinations the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::Invalid("TICK_RATE_HZ"));
        }
        // The negated comparison also catches NaN from the env parse
        if !(self.map_width >= MIN_MAP_EXTENT) || !(self.map_height >= MIN_MAP_EXTENT) {
            return Err(ConfigError::MapTooSmall(MIN_MAP_EXTENT));
        }
        Ok(())
    }

    /// Tick period in seconds
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate_hz.max(1) as f32
    }

    /// Convert a millisecond delay into a whole number of ticks (at least one)
    pub fn ticks_for_millis(&self, millis: u64) -> u64 {
        ((millis * self.tick_rate_hz.max(1) as u64) / 1000).max(1)
    }
}

/// Parse an env var if present, otherwise use the default
fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            supabase_url: env::var("SUPABASE_URL")
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .map_err(|_| ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            game: GameConfig::from_env()?,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Arena too small: MAP_WIDTH and MAP_HEIGHT must be at least {0}")]
    MapTooSmall(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_defaults_are_consistent() {
        let game = GameConfig::default();
        assert_eq!(game.tick_rate_hz, 60);
        assert!(game.collision_radius > 0.0);
        assert!(game.charge_damage > 0.0 && game.charge_damage <= 100.0);
        assert!(game.env_damage < game.charge_damage);
    }

    #[test]
    fn tick_delta_matches_rate() {
        let game = GameConfig {
            tick_rate_hz: 50,
            ..GameConfig::default()
        };
        assert!((game.tick_delta() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn undersized_arena_is_rejected() {
        let game = GameConfig {
            map_width: 100.0,
            ..GameConfig::default()
        };
        assert!(matches!(game.validate(), Err(ConfigError::MapTooSmall(_))));

        let game = GameConfig {
            map_height: 0.0,
            ..GameConfig::default()
        };
        assert!(game.validate().is_err());

        let game = GameConfig {
            map_width: f32::NAN,
            ..GameConfig::default()
        };
        assert!(game.validate().is_err());
    }

    #[test]
    fn minimal_arena_and_defaults_pass_validation() {
        assert!(GameConfig::default().validate().is_ok());
        let game = GameConfig {
            map_width: MIN_MAP_EXTENT,
            map_height: MIN_MAP_EXTENT,
            ..GameConfig::default()
        };
        assert!(game.validate().is_ok());
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let game = GameConfig {
            tick_rate_hz: 0,
            ..GameConfig::default()
        };
        assert!(matches!(game.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ticks_for_millis_rounds_down_but_never_to_zero() {
        let game = GameConfig::default();
        assert_eq!(game.ticks_for_millis(1000), 60);
        assert_eq!(game.ticks_for_millis(30_000), 1800);
        // Sub-tick delays still take one full tick
        assert_eq!(game.ticks_for_millis(1), 1);
    }
}
