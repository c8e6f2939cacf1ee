/*!
 * Engine Configuration
 *
 * Runtime configuration for the dispatch machinery. Values come from
 * defaults, a JSON file, or `PROCSIM_*` environment variables.
 */

use super::errors::ConfigError;
use super::limits::{DEFAULT_DISPATCH_STACK, DEFAULT_GUARD_SIZE, MIN_DISPATCH_STACK, STACK_ALIGN};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding the dispatch stack size (bytes)
pub const ENV_STACK_SIZE: &str = "PROCSIM_STACK_SIZE";
/// Environment variable overriding the guard zone size (bytes)
pub const ENV_GUARD_SIZE: &str = "PROCSIM_GUARD_SIZE";
/// Environment variable enabling per-dispatch spans
pub const ENV_LOG_DISPATCH: &str = "PROCSIM_LOG_DISPATCH";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct EngineConfig {
    /// Size of the shared dispatch stack in bytes
    pub dispatch_stack_size: usize,
    /// Size of the sentinel-painted zone at the low end of the dispatch stack
    pub guard_size: usize,
    /// Open a tracing span around every dispatch
    pub log_dispatch: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch_stack_size: DEFAULT_DISPATCH_STACK,
            guard_size: DEFAULT_GUARD_SIZE,
            log_dispatch: false,
        }
    }
}

impl EngineConfig {
    #[inline]
    #[must_use]
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.dispatch_stack_size = bytes;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_guard_size(mut self, bytes: usize) -> Self {
        self.guard_size = bytes;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_dispatch_logging(mut self, enabled: bool) -> Self {
        self.log_dispatch = enabled;
        self
    }

    /// Load configuration from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `PROCSIM_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(bytes) = env_usize(ENV_STACK_SIZE)? {
            config.dispatch_stack_size = bytes;
        }
        if let Some(bytes) = env_usize(ENV_GUARD_SIZE)? {
            config.guard_size = bytes;
        }
        if let Ok(v) = std::env::var(ENV_LOG_DISPATCH) {
            config.log_dispatch = v == "1" || v.eq_ignore_ascii_case("true");
        }
        config.validate()?;
        Ok(config)
    }

    /// Check sizes against the machinery's requirements
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch_stack_size < MIN_DISPATCH_STACK {
            return Err(ConfigError::Invalid(
                format!(
                    "dispatch_stack_size {} is below the minimum {}",
                    self.dispatch_stack_size, MIN_DISPATCH_STACK
                )
                .into(),
            ));
        }
        if self.dispatch_stack_size % STACK_ALIGN != 0 || self.guard_size % STACK_ALIGN != 0 {
            return Err(ConfigError::Invalid(
                format!("stack and guard sizes must be multiples of {}", STACK_ALIGN).into(),
            ));
        }
        if self.guard_size >= self.dispatch_stack_size / 2 {
            return Err(ConfigError::Invalid(
                "guard_size must be less than half of dispatch_stack_size".into(),
            ));
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("{}={:?}: {}", key, raw, e).into())),
        Err(_) => Ok(None),
    }
}
