//! # winpan Configuration System
//!
//! Hierarchical configuration for winpan.
//!
//! ## Features
//! - **Unified Configuration**: one struct shared by every component
//! - **Validation**: per-field ranges plus cross-field sizing checks
//! - **Environment Awareness**: `WINPAN_*` overrides on top of YAML files

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

mod audio;
mod core;
mod error;
mod telemetry;
pub mod validation;

pub use audio::AudioConfig;
pub use core::{CoreConfig, EventLoopConfig, MemoryConfig, ProcessConfig};
pub use error::ConfigError;
pub use telemetry::{MetricsConfig, TelemetryConfig};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/winpan.yaml";

/// Top‑level configuration container for all winpan components.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
#[serde(default)]
pub struct WinpanConfig {
    /// Core system configuration (arena, process index, event loop).
    #[validate(nested)]
    pub core: CoreConfig,

    /// Sink-input tracking and panning.
    #[validate(nested)]
    pub audio: AudioConfig,

    /// Telemetry and observability configuration.
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl WinpanConfig {
    /// Load configuration from the default file and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/winpan.yaml`, if present
    /// 3. `WINPAN_*` environment variables (`__` separates nesting levels)
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(WinpanConfig::default()));

        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            figment = figment.merge(Yaml::file(DEFAULT_CONFIG_PATH));
        } else {
            debug!("{DEFAULT_CONFIG_PATH} not found, using default configuration");
        }

        Self::finish(figment)
    }

    /// Load configuration from a specific path, layered over the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::finish(
            Figment::from(Serialized::defaults(WinpanConfig::default())).merge(Yaml::file(path)),
        )
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed("WINPAN_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                config.check_sizing()?;
                Ok(config)
            })
    }

    /// The scratch arena must hold at least one full process query.
    pub fn check_sizing(&self) -> Result<(), ConfigError> {
        let needed = validation::scan_footprint(self.core.process.index_exponent);
        if self.core.memory.arena_size < needed {
            return Err(ConfigError::Sizing(format!(
                "arena_size {} is below the {} bytes a 2^{} slot process index needs",
                self.core.memory.arena_size, needed, self.core.process.index_exponent
            )));
        }
        Ok(())
    }
}
