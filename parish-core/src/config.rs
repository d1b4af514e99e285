//! Configuration for parish.
//!
//! Values are layered: built-in defaults, then `~/.config/parish/config.toml`,
//! then `PARISH_*` environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::constants::{
    DEFAULT_COLLECTION, DEFAULT_DATA_DIR, DEFAULT_HORIZON_MONTHS, ENV_PREFIX, MAX_HORIZON_DAYS,
    MAX_HORIZON_MONTHS,
};
use crate::engine::{EngineConfig, Horizon};
use crate::error::{ParishError, ParishResult};
use crate::store::{DocumentStore, FileStore, MemoryStore};

/// Which [`DocumentStore`] implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON documents under `data_dir`
    #[default]
    File,
    /// Process-local; nothing survives exit
    Memory,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_horizon_months() -> u32 {
    DEFAULT_HORIZON_MONTHS
}

fn default_timezone() -> Tz {
    Tz::UTC
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParishConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,

    /// Overrides `horizon_months` with a window measured in days.
    #[serde(default)]
    pub horizon_days: Option<u32>,

    /// IANA zone whose wall clock recurrence rules follow.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

impl Default for ParishConfig {
    fn default() -> Self {
        ParishConfig {
            backend: Backend::default(),
            data_dir: default_data_dir(),
            collection: default_collection(),
            horizon_months: default_horizon_months(),
            horizon_days: None,
            timezone: default_timezone(),
        }
    }
}

impl ParishConfig {
    pub fn config_path() -> ParishResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ParishError::Config("Could not determine config directory".into()))?
            .join("parish");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, writing a commented-out config file
    /// there first if none exists.
    pub fn load() -> ParishResult<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            Self::create_default_config(&path)?;
        }

        Self::load_from(&path)
    }

    /// Load from `path` (which may be missing) plus the environment.
    pub fn load_from(path: &Path) -> ParishResult<Self> {
        let config: ParishConfig = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| ParishError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ParishError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ParishResult<()> {
        if self.horizon_days == Some(0) || (self.horizon_days.is_none() && self.horizon_months == 0) {
            return Err(ParishError::Config("The sync horizon must be at least one day".into()));
        }
        let too_long = match self.horizon_days {
            Some(days) => days > MAX_HORIZON_DAYS,
            None => self.horizon_months > MAX_HORIZON_MONTHS,
        };
        if too_long {
            return Err(ParishError::Config(format!(
                "The sync horizon cannot exceed {} months ({} days)",
                MAX_HORIZON_MONTHS, MAX_HORIZON_DAYS
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(ParishError::Config("The event collection name cannot be empty".into()));
        }
        Ok(())
    }

    /// `data_dir` with `~` and environment variables expanded.
    pub fn data_path(&self) -> PathBuf {
        let expanded = shellexpand::full(&self.data_dir.to_string_lossy())
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned());

        PathBuf::from(expanded)
    }

    pub fn horizon(&self) -> Horizon {
        match self.horizon_days {
            Some(days) => Horizon::Days(days),
            None => Horizon::Months(self.horizon_months),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            collection: self.collection.clone(),
            horizon: self.horizon(),
            timezone: self.timezone,
        }
    }

    pub fn open_store(&self) -> Arc<dyn DocumentStore> {
        match self.backend {
            Backend::File => Arc::new(FileStore::new(self.data_path())),
            Backend::Memory => Arc::new(MemoryStore::new()),
        }
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> ParishResult<()> {
        let contents = format!(
            "\
# parish configuration

# Storage backend: \"file\" or \"memory\"
# backend = \"file\"

# Where event documents are stored:
# data_dir = \"{}\"

# How many months of recurring events to keep ahead:
# horizon_months = {}

# Time zone recurring events follow:
# timezone = \"America/Chicago\"
",
            DEFAULT_DATA_DIR, DEFAULT_HORIZON_MONTHS
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ParishError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ParishError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}
