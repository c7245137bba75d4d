//! Configuration loading and management.

use crate::error::{LedgerError, LedgerResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "chore-ledger.yaml";

/// Ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("chore-ledger.db")
}

/// Shared admin secret gating template management and verification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// When unset, admin operations are open.
    #[serde(default)]
    pub secret: Option<String>,
}

impl AdminConfig {
    /// Check a caller-supplied secret against the configured one.
    pub fn authorize(&self, provided: Option<&str>) -> LedgerResult<()> {
        match (self.secret.as_deref(), provided) {
            (None, _) => Ok(()),
            (Some(expected), Some(given)) if expected == given => Ok(()),
            (Some(_), _) => Err(LedgerError::Forbidden(
                "admin secret missing or incorrect".to_string(),
            )),
        }
    }
}

/// The default player seeded into an empty database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_name")]
    pub name: String,

    #[serde(default)]
    pub starting_balance: i64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            name: default_player_name(),
            starting_balance: 0,
        }
    }
}

fn default_player_name() -> String {
    "player".to_string()
}

/// Daily refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the midnight refresh loop under `serve`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Run one refresh cycle immediately when `serve` starts.
    #[serde(default = "default_true")]
    pub refresh_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_on_startup: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Resolve configuration: an explicit file must load; otherwise the
    /// default file is used if present. Environment variables apply last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `CHORE_LEDGER_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(db_path) = std::env::var("CHORE_LEDGER_DB_PATH") {
            self.store.db_path = PathBuf::from(db_path);
        }

        if let Ok(secret) = std::env::var("CHORE_LEDGER_ADMIN_SECRET") {
            if !secret.is_empty() {
                self.admin.secret = Some(secret);
            }
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.store.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config = Config::from_yaml("player:\n  name: Alex\n").unwrap();
        assert_eq!(config.player.name, "Alex");
        assert_eq!(config.player.starting_balance, 0);
        assert_eq!(config.store.db_path, PathBuf::from("chore-ledger.db"));
        assert!(config.scheduler.enabled);
        assert!(config.scheduler.refresh_on_startup);
        assert!(config.admin.secret.is_none());
    }

    #[test]
    fn full_file_parses() {
        let yaml = r#"
store:
  db_path: /tmp/chores.db
admin:
  secret: hunter2
player:
  name: Sam
  starting_balance: 10
scheduler:
  enabled: false
  refresh_on_startup: false
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/chores.db"));
        assert_eq!(config.admin.secret.as_deref(), Some("hunter2"));
        assert_eq!(config.player.starting_balance, 10);
        assert!(!config.scheduler.enabled);
    }

    #[test]
    fn open_admin_when_no_secret() {
        let admin = AdminConfig::default();
        assert!(admin.authorize(None).is_ok());
        assert!(admin.authorize(Some("anything")).is_ok());
    }

    #[test]
    fn secret_must_match() {
        let admin = AdminConfig {
            secret: Some("s3cret".into()),
        };
        assert!(admin.authorize(Some("s3cret")).is_ok());
        let err = admin.authorize(Some("nope")).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Forbidden);
        assert!(admin.authorize(None).is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.yaml");
        std::fs::write(&path, "store:\n  db_path: data/ledger.db\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("data/ledger.db"));
    }
}
