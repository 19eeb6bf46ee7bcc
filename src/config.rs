// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::{LockError, Result};
use crate::locking::acquisition::{LockWaitOptions, PollingBackoff};
use crate::locking::timeout::{
    LockTimeoutResolution, LockTimeoutResolver, LockTimeoutValue, parse_timeout_override,
};
use crate::locking::wait_observer::LoggingWaitObserver;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "txmon.toml";

/// Prefix for nested overrides such as `TXMON__LOCKING__TIMEOUT`.
pub const ENV_PREFIX: &str = "TXMON";

/// Single-variable timeout override, applied above the configuration file.
pub const LOCK_TIMEOUT_ENV: &str = "TXMON_LOCK_TIMEOUT";

const DEFAULT_TIMEOUT: &str = "infinite";
const DEFAULT_WAIT_SLICE_INITIAL_MS: u64 = 10;
const DEFAULT_WAIT_SLICE_FACTOR: u32 = 2;
const DEFAULT_WAIT_SLICE_CAP_MS: u64 = 1_100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TxmonConfig {
    #[serde(default)]
    pub locking: LockingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockingConfig {
    /// `infinite` or a whole number of seconds.
    pub timeout: String,
    pub wait_slice_initial_ms: u64,
    pub wait_slice_factor: u32,
    pub wait_slice_cap_ms: u64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT.to_string(),
            wait_slice_initial_ms: DEFAULT_WAIT_SLICE_INITIAL_MS,
            wait_slice_factor: DEFAULT_WAIT_SLICE_FACTOR,
            wait_slice_cap_ms: DEFAULT_WAIT_SLICE_CAP_MS,
        }
    }
}

impl TxmonConfig {
    /// Loads `txmon.toml` from `config_dir` (if present) with `TXMON__*`
    /// environment overrides applied on top.
    pub fn load(config_dir: &Path) -> Result<Self> {
        Self::load_from(&config_dir.join(CONFIG_FILE_NAME))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file not found at {path:?}, using defaults and environment");
        }

        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: TxmonConfig = settings.try_deserialize()?;
        config.locking.validate()?;
        log::debug!("Loaded lock configuration: {:?}", config.locking);
        Ok(config)
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        fs::create_dir_all(config_dir)?;

        let contents = toml::to_string_pretty(self)
            .map_err(|e| LockError::ConfigError(format!("Failed to serialize config: {e}")))?;

        fs::write(&config_path, contents)?;
        log::debug!("Saved config to {config_path:?}");
        Ok(())
    }
}

impl LockingConfig {
    pub fn validate(&self) -> Result<()> {
        parse_timeout_override(&self.timeout)?;
        if self.wait_slice_initial_ms == 0 {
            return Err(LockError::ConfigError(
                "locking.wait_slice_initial_ms must be greater than zero".to_string(),
            ));
        }
        if self.wait_slice_factor == 0 {
            return Err(LockError::ConfigError(
                "locking.wait_slice_factor must be at least 1".to_string(),
            ));
        }
        if self.wait_slice_cap_ms < self.wait_slice_initial_ms {
            return Err(LockError::ConfigError(format!(
                "locking.wait_slice_cap_ms ({}) is smaller than wait_slice_initial_ms ({})",
                self.wait_slice_cap_ms, self.wait_slice_initial_ms
            )));
        }
        Ok(())
    }

    pub fn timeout_value(&self) -> Result<LockTimeoutValue> {
        parse_timeout_override(&self.timeout)
    }

    /// Applies `explicit`, then `TXMON_LOCK_TIMEOUT`, then this configuration.
    pub fn resolve_timeout(&self, explicit: Option<&str>) -> Result<LockTimeoutResolution> {
        let environment = std::env::var(LOCK_TIMEOUT_ENV).ok();
        LockTimeoutResolver::new(self.timeout_value()?, LockTimeoutValue::Infinite)
            .with_explicit(explicit)
            .with_environment(environment.as_deref())
            .resolve()
    }

    pub fn backoff(&self) -> PollingBackoff {
        PollingBackoff::new(
            Duration::from_millis(self.wait_slice_initial_ms),
            self.wait_slice_factor,
            Duration::from_millis(self.wait_slice_cap_ms),
        )
    }

    /// Wait settings for the facades, with waits reported through `log`.
    pub fn wait_options(&self, explicit_timeout: Option<&str>) -> Result<LockWaitOptions> {
        let resolution = self.resolve_timeout(explicit_timeout)?;
        log::debug!(
            "Lock timeout {} from {}",
            resolution.value,
            resolution.source
        );
        let mut options = LockWaitOptions::default()
            .with_timeout(resolution.value)
            .with_backoff(self.backoff())
            .with_observer(Arc::new(LoggingWaitObserver));
        options.timeout_source = resolution.source;
        Ok(options)
    }
}
