//! Interceptor configuration.
//!
//! Resolved as: defaults, then the TOML file at `$PQEXT_CONFIG` (or
//! `<config dir>/pqext/config.toml`), then `PQEXT_STRATEGY`.
//!
//! ```toml
//! strategy = "in-place"
//! warn_unconfigured = true
//! map_empty_results = false
//! ```

use crate::error::{PqExtError, PqExtResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_ENV: &str = "PQEXT_CONFIG";
pub const STRATEGY_ENV: &str = "PQEXT_STRATEGY";

/// Which `ResultMapper` a connection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingStrategy {
    /// Shrink-only rewrite of the fetched buffers. Kept for drivers that
    /// never change the column set.
    InPlace,
    #[default]
    Rebuild,
}

impl MappingStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingStrategy::InPlace => "in-place",
            MappingStrategy::Rebuild => "rebuild",
        }
    }
}

impl FromStr for MappingStrategy {
    type Err = PqExtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-place" | "in_place" | "inplace" => Ok(MappingStrategy::InPlace),
            "rebuild" => Ok(MappingStrategy::Rebuild),
            other => Err(PqExtError::Config(format!(
                "unknown mapping strategy '{}'. Expected: in-place or rebuild",
                other
            ))),
        }
    }
}

impl std::fmt::Display for MappingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorConfig {
    pub strategy: MappingStrategy,

    /// Warn when a connection runs without a driver.
    pub warn_unconfigured: bool,

    /// Offer results without columns (command completions) to the mapper.
    pub map_empty_results: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            strategy: MappingStrategy::default(),
            warn_unconfigured: true,
            map_empty_results: false,
        }
    }
}

impl InterceptorConfig {
    pub fn builder() -> InterceptorConfigBuilder {
        InterceptorConfigBuilder::default()
    }

    /// `$PQEXT_CONFIG`, else `<config dir>/pqext/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("pqext").join("config.toml")))
    }

    /// Load from the default path and environment.
    ///
    /// Returns the path the file was read from, if one existed.
    pub fn load() -> PqExtResult<(Self, Option<PathBuf>)> {
        let path = Self::default_path().filter(|p| p.exists());
        let config = match &path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env(|key| std::env::var(key).ok())?;
        Ok((config, path))
    }

    pub fn from_file(path: impl AsRef<Path>) -> PqExtResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> PqExtResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides read through `var`.
    pub fn apply_env<F>(mut self, var: F) -> PqExtResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(strategy) = var(STRATEGY_ENV) {
            self.strategy = strategy.parse()?;
        }
        Ok(self)
    }

    pub fn to_toml_string(&self) -> PqExtResult<String> {
        toml::to_string(self).map_err(|e| PqExtError::Config(e.to_string()))
    }
}

/// Builder for `InterceptorConfig`.
#[derive(Debug, Default)]
pub struct InterceptorConfigBuilder {
    config: InterceptorConfig,
}

impl InterceptorConfigBuilder {
    pub fn strategy(mut self, strategy: MappingStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn warn_unconfigured(mut self, warn: bool) -> Self {
        self.config.warn_unconfigured = warn;
        self
    }

    pub fn map_empty_results(mut self, map: bool) -> Self {
        self.config.map_empty_results = map;
        self
    }

    pub fn build(self) -> InterceptorConfig {
        self.config
    }
}
