//! Configuration loaded from `config.toml`
//!
//! Lookup order: `$FUNDBOOK_CONFIG`, then `<config_home>/fundbook/config.toml`.
//! A missing file means defaults. `FUNDBOOK_USER` overrides `user_email`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file; defaults to ~/.fundbook/data.db
    pub database_path: Option<PathBuf>,

    /// Currency used when a command does not name one
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Email of the acting user, looked up in the users table
    pub user_email: Option<String>,

    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Print "$ 1,000.00" instead of "USD 1,000.00" where a symbol is known
    pub currency_symbol: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency_symbol: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            default_currency: default_currency(),
            user_email: None,
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        crate::utils::normalize_currency(&config.default_currency)
            .with_context(|| format!("Invalid default_currency in {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the config location and apply environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) => Self::load_or_default(&path)?,
            None => Self::default(),
        };
        if let Ok(user) = std::env::var("FUNDBOOK_USER") {
            if !user.trim().is_empty() {
                config.user_email = Some(user);
            }
        }
        Ok(config)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("FUNDBOOK_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dir_spec::config_home().map(|dir| dir.join("fundbook").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_currency, "USD");
        assert!(config.database_path.is_none());
        assert!(config.user_email.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "user_email = \"gp@example.com\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.user_email.as_deref(), Some("gp@example.com"));
        assert_eq!(config.default_currency, "USD");
        assert!(config.display.currency_symbol);
    }

    #[test]
    fn test_display_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "default_currency = \"eur\"\n\n[display]\ncurrency_symbol = false\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(!config.display.currency_symbol);
        assert_eq!(config.default_currency, "eur");
    }

    #[test]
    fn test_invalid_currency_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_currency = \"dollars\"\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
