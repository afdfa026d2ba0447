//! # tracker-config
//!
//! Layered configuration loading for the student tracker import.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`TRACKER_*` prefix, `__` as separator)
//! 2. Project-level `.tracker/config.toml`
//! 3. User-level `~/.config/tracker/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `TRACKER_DATABASE__PASSWORD` -> `database.password`,
//! `TRACKER_SCHEDULING__API_KEY` -> `scheduling.api_key`,
//! `TRACKER_CRM__USER` / `TRACKER_CRM__KEY` -> `crm.user` / `crm.key`, and
//! `TRACKER_CODE_HOST__KEY` -> `code_host.key`.
//!
//! # Usage
//!
//! ```no_run
//! use tracker_config::TrackerConfig;
//!
//! let config = TrackerConfig::load_with_dotenv().expect("config");
//! config.require_import().expect("import credentials");
//! ```

mod code_host;
mod crm;
mod database;
mod error;
mod general;
mod scheduling;
mod windows;

pub use code_host::CodeHostConfig;
pub use crm::CrmConfig;
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use general::GeneralConfig;
pub use scheduling::SchedulingConfig;
pub use windows::{CrmExportConfig, ImportConfig};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub code_host: CodeHostConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub crm_export: CrmExportConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

impl TrackerConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` loading.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Figment`] if a source is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Figment`] if a source is malformed.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can add providers on top.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: user-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: project-local config

        let local_path = PathBuf::from(".tracker/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: environment variables (highest priority)
        figment.merge(Env::prefixed("TRACKER_").split("__"))
    }

    /// Check the sections `tracker import` talks to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotConfigured`] naming the first incomplete section.
    pub fn require_import(&self) -> Result<(), ConfigError> {
        require("database", self.database.is_configured())?;
        require("scheduling", self.scheduling.is_configured())?;
        require("code_host", self.code_host.is_configured())
    }

    /// Check the sections `tracker crm-export` talks to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotConfigured`] naming the first incomplete section.
    pub fn require_crm_export(&self) -> Result<(), ConfigError> {
        require("database", self.database.is_configured())?;
        require("crm", self.crm.is_configured())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tracker").join("config.toml"))
    }

    /// Load `.env` from the workspace root, falling back to the current dir.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            // crate -> crates/ -> workspace root
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}

fn require(section: &str, configured: bool) -> Result<(), ConfigError> {
    if configured {
        Ok(())
    } else {
        Err(ConfigError::NotConfigured {
            section: section.to_string(),
        })
    }
}
