//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::{MatchConfig, MatchConfigError};
use crate::util::rate_limit::INPUT_RATE_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Secret used to sign per-match bot tokens
    pub bot_token_secret: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,

    /// Rules applied to matches that do not override them
    pub match_defaults: MatchConfig,
    /// Input submissions per second allowed for each bot
    pub input_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let defaults = MatchConfig::default();
        let match_defaults = MatchConfig {
            rounds_to_win: parse_or(&lookup, "ROUNDS_TO_WIN", defaults.rounds_to_win)?,
            round_time_seconds: parse_or(&lookup, "ROUND_TIME_SECONDS", defaults.round_time_seconds)?,
            countdown_seconds: parse_or(&lookup, "COUNTDOWN_SECONDS", defaults.countdown_seconds)?,
            decision_deadline_ms: parse_or(&lookup, "DECISION_DEADLINE_MS", defaults.decision_deadline_ms)?,
            ..defaults
        };
        match_defaults.validate()?;

        let bot_token_secret = lookup("BOT_TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN_SECRET"))?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            bot_token_secret,
            client_origin: lookup("CLIENT_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),

            match_defaults,
            input_rate_limit: parse_or(&lookup, "INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("Invalid match defaults: {0}")]
    Match(#[from] MatchConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("BOT_TOKEN_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.match_defaults, MatchConfig::default());
        assert_eq!(config.input_rate_limit, INPUT_RATE_LIMIT);
    }

    #[test]
    fn test_port_overrides_server_addr() {
        let config = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN_SECRET", "s3cret"),
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:7000"),
        ]))
        .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn test_match_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN_SECRET", "s3cret"),
            ("ROUNDS_TO_WIN", "3"),
            ("ROUND_TIME_SECONDS", "60"),
            ("DECISION_DEADLINE_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.match_defaults.rounds_to_win, 3);
        assert_eq!(config.match_defaults.round_time_seconds, 60);
        assert_eq!(config.match_defaults.decision_deadline_ms, 250);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[])),
            Err(ConfigError::Missing("BOT_TOKEN_SECRET"))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("BOT_TOKEN_SECRET", "x"), ("ROUNDS_TO_WIN", "two")])),
            Err(ConfigError::Invalid { name: "ROUNDS_TO_WIN", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("BOT_TOKEN_SECRET", "x"), ("ROUNDS_TO_WIN", "7")])),
            Err(ConfigError::Match(MatchConfigError::InvalidRoundsToWin(7)))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("BOT_TOKEN_SECRET", "x"), ("SERVER_ADDR", "nope")])),
            Err(ConfigError::InvalidAddress)
        ));
    }
}
