//! Network and loop configuration, loaded from JSON.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use hearthguard_tick::TickConfig;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or checking a [`NetConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where to connect or listen, how many players a match needs, and how
/// fast the loop ticks.
///
/// Every field has a default, so a config file only needs the fields it
/// changes:
///
/// ```json
/// { "port": 7000, "log_filter": "hearthguard=debug,info" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// IP literal to connect to (client) or bind to (server).
    pub address: String,
    pub port: u16,
    /// Peers the server waits for before starting a match.
    pub expected_players: usize,
    pub tick_rate_hz: u32,
    /// Default `tracing` filter directive; `RUST_LOG` overrides it.
    pub log_filter: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 6969,
            expected_players: 2,
            tick_rate_hz: 60,
            log_filter: "info".to_string(),
        }
    }
}

impl NetConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// Checks values the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.parse::<IpAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "address {:?} is not an IP literal",
                self.address
            )));
        }
        if self.expected_players == 0 {
            return Err(ConfigError::Invalid(
                "expected_players must be at least 1".to_string(),
            ));
        }
        if self.tick_rate_hz == 0 || self.tick_rate_hz > TickConfig::MAX_TICK_RATE_HZ {
            return Err(ConfigError::Invalid(format!(
                "tick_rate_hz must be within 1..={}",
                TickConfig::MAX_TICK_RATE_HZ
            )));
        }
        Ok(())
    }

    /// Tick scheduler settings for this config.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig::with_rate(self.tick_rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn test_default_matches_documented_values() {
        let cfg = NetConfig::default();
        assert_eq!(cfg.address, "127.0.0.1");
        assert_eq!(cfg.port, 6969);
        assert_eq!(cfg.expected_players, 2);
        assert_eq!(cfg.tick_rate_hz, 60);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let file = write_temp(r#"{ "port": 7000, "log_filter": "debug" }"#);
        let cfg = NetConfig::load(file.path()).expect("load");
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.log_filter, "debug");
        assert_eq!(cfg.address, "127.0.0.1");
        assert_eq!(cfg.expected_players, 2);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = NetConfig::load(dir.path().join("nope.json")).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_malformed_json_is_parse_error() {
        let file = write_temp("{ port: }");
        let err = NetConfig::load(file.path()).expect_err("malformed");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_hostname_address() {
        let file = write_temp(r#"{ "address": "localhost" }"#);
        let err = NetConfig::load(file.path()).expect_err("hostname");
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("localhost")));
    }

    #[test]
    fn test_validate_rejects_zero_players_and_bad_rate() {
        let cfg = NetConfig {
            expected_players: 0,
            ..NetConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = NetConfig {
            tick_rate_hz: 500,
            ..NetConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_serialize_roundtrip_through_json() {
        let cfg = NetConfig {
            port: 1234,
            ..NetConfig::default()
        };
        let json = serde_json::to_string(&cfg).expect("serialize");
        let back: NetConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, cfg);
    }
}
