//! Configuration module - environment variable parsing

use std::env;

/// Application configuration loaded from environment variables.
/// Every knob has a default so the simulation runs with no environment.
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Arena generation seed; a random seed is drawn when unset
    pub arena_seed: Option<u64>,
    /// Number of static obstacles in the field
    pub obstacle_count: usize,

    /// Default tag round length in seconds
    pub round_duration_secs: u32,
    /// Autonomous opponents at session start
    pub bot_count: usize,
    /// Debug both-bots mode: the initial "it" draw excludes the human
    pub force_bot_it: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            arena_seed: parse_opt("ARENA_SEED")?,
            obstacle_count: parse_or("OBSTACLE_COUNT", 24)?,

            round_duration_secs: parse_or("ROUND_DURATION_SECS", 120)?,
            bot_count: parse_or("BOT_COUNT", 1)?,
            force_bot_it: parse_or("FORCE_BOT_IT", false)?,
        })
    }
}

fn parse_opt<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(None),
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_opt(key)?.unwrap_or(default))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
