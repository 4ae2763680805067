//! Application-level configuration loading: optional JSON file plus environment overrides.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_CONFIG_PATH";
const PORT_ENV: &str = "PORT";
const ROUND_LIMIT_ENV: &str = "ROUND_LIMIT";

/// Port used when neither the file nor `PORT` set one.
pub const DEFAULT_PORT: u16 = 4000;
/// Rounds played per game unless configured otherwise.
pub const DEFAULT_ROUND_LIMIT: u32 = 10;
/// Pause between a round's results and the next question.
pub const DEFAULT_ROUND_ADVANCE_DELAY: Duration = Duration::from_secs(2);

/// Gameplay knobs consumed by the lobby dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// Number of rounds after which a game ends; at least 1.
    pub round_limit: u32,
    /// Delay before a resolved round automatically advances.
    pub round_advance_delay: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            round_limit: DEFAULT_ROUND_LIMIT,
            round_advance_delay: DEFAULT_ROUND_ADVANCE_DELAY,
        }
    }
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// TCP port the HTTP server binds to.
    pub port: u16,
    /// Gameplay settings.
    pub game: GameSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            game: GameSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load the configuration file (if any) and apply `PORT` / `ROUND_LIMIT` overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let raw = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    RawConfig::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                RawConfig::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                RawConfig::default()
            }
        };

        Self::from_sources(raw, |key| env::var(key).ok())
    }

    /// Merge file values with environment lookups; the environment wins.
    fn from_sources(raw: RawConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut port = raw.port.unwrap_or(defaults.port);
        let mut round_limit = raw.round_limit.unwrap_or(defaults.game.round_limit);
        let round_advance_delay = raw
            .round_advance_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.game.round_advance_delay);

        if let Some(value) = lookup(PORT_ENV) {
            match value.trim().parse() {
                Ok(parsed) => port = parsed,
                Err(err) => warn!(%value, error = %err, "ignoring invalid PORT"),
            }
        }

        if let Some(value) = lookup(ROUND_LIMIT_ENV) {
            match value.trim().parse() {
                Ok(parsed) => round_limit = parsed,
                Err(err) => warn!(%value, error = %err, "ignoring invalid ROUND_LIMIT"),
            }
        }

        if round_limit == 0 {
            warn!("round limit must be at least 1; using 1");
            round_limit = 1;
        }

        Self {
            port,
            game: GameSettings {
                round_limit,
                round_advance_delay,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    round_limit: Option<u32>,
    #[serde(default)]
    round_advance_delay_ms: Option<u64>,
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = AppConfig::from_sources(RawConfig::default(), env_of(&[]));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.port, 4000);
        assert_eq!(config.game.round_limit, 10);
        assert_eq!(config.game.round_advance_delay, Duration::from_secs(2));
    }

    #[test]
    fn file_values_are_used_and_env_wins() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"port": 5000, "round_limit": 3, "round_advance_delay_ms": 500}"#,
        )
        .unwrap();
        let config = AppConfig::from_sources(raw, env_of(&[("ROUND_LIMIT", "7")]));
        assert_eq!(config.port, 5000);
        assert_eq!(config.game.round_limit, 7);
        assert_eq!(
            config.game.round_advance_delay,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let config = AppConfig::from_sources(
            RawConfig::default(),
            env_of(&[("PORT", "http"), ("ROUND_LIMIT", "-2")]),
        );
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.game.round_limit, DEFAULT_ROUND_LIMIT);
    }

    #[test]
    fn zero_round_limit_is_clamped() {
        let config =
            AppConfig::from_sources(RawConfig::default(), env_of(&[("ROUND_LIMIT", "0")]));
        assert_eq!(config.game.round_limit, 1);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{"port": 8081}"#).unwrap();
        let config = AppConfig::from_sources(raw, env_of(&[]));
        assert_eq!(config.port, 8081);
        assert_eq!(config.game, GameSettings::default());
    }
}
