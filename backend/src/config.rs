//! Runtime settings from the environment.
//!
//! A `.env` file in the working directory is loaded first if present.
//! Command-line flags override every value here.
//!
//! | Variable               | Meaning                         | Default              |
//! |------------------------|---------------------------------|----------------------|
//! | `LAYOFFS_RULES`        | rules JSON file                 | built-in rules       |
//! | `LAYOFFS_SNAPSHOT_DIR` | snapshot store root             | `.layoffs/snapshots` |
//! | `LAYOFFS_PORT`         | HTTP port for `serve`           | `3000`               |

use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::snapshots::DEFAULT_SNAPSHOT_DIR;

pub const DEFAULT_PORT: u16 = 3000;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub const RULES_VAR: &str = "LAYOFFS_RULES";
pub const SNAPSHOT_DIR_VAR: &str = "LAYOFFS_SNAPSHOT_DIR";
pub const PORT_VAR: &str = "LAYOFFS_PORT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub rules_path: Option<PathBuf>,
    pub snapshot_dir: PathBuf,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rules_path: None,
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    /// Load `.env`, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(path) = get(RULES_VAR) {
            settings.rules_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = get(SNAPSHOT_DIR_VAR) {
            settings.snapshot_dir = PathBuf::from(dir);
        }
        if let Some(port) = get(PORT_VAR) {
            settings.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: PORT_VAR.to_string(),
                value: port.clone(),
            })?;
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.snapshot_dir, PathBuf::from(".layoffs/snapshots"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (RULES_VAR, "rules/strict.json"),
            (SNAPSHOT_DIR_VAR, "/tmp/snaps"),
            (PORT_VAR, "8080"),
        ]))
        .unwrap();
        assert_eq!(settings.rules_path, Some(PathBuf::from("rules/strict.json")));
        assert_eq!(settings.snapshot_dir, PathBuf::from("/tmp/snaps"));
        assert_eq!(settings.port, 8080);
    }

    #[test]
    fn test_empty_value_is_unset() {
        let settings = Settings::from_lookup(lookup(&[(RULES_VAR, "  ")])).unwrap();
        assert!(settings.rules_path.is_none());
    }

    #[test]
    fn test_bad_port() {
        let err = Settings::from_lookup(lookup(&[(PORT_VAR, "http")])).unwrap_err();
        assert!(err.to_string().contains("LAYOFFS_PORT"));
    }
}
