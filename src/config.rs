//! Device configuration.
//!
//! Configuration is read from an optional JSON file and then overridden by
//! command-line flags. Every field has a default, so an empty object (or no
//! file at all) is a valid configuration.

use crate::error::{Error, IoError, Result};
use crate::sampler::MAX_RAND;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default device name.
pub const DEFAULT_DEVICE_NAME: &str = "kernel-roulette";

/// What the device does when a fatal failure occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Return the error to the caller.
    #[default]
    Propagate,
    /// Log the error and abort the process.
    Abort,
}

/// Configuration for one roulette device.
///
/// # Examples
///
/// ```
/// use kernel_roulette::config::{DeviceConfig, FailurePolicy};
///
/// let config: DeviceConfig = serde_json::from_str(r#"{"chance": 10}"#).unwrap();
/// assert_eq!(config.chance, Some(10));
/// assert_eq!(config.name, "kernel-roulette");
/// assert_eq!(config.failure_policy, FailurePolicy::Propagate);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name the device registers under.
    pub name: String,

    /// Initial chance; drawn at random when unset.
    pub chance: Option<u8>,

    /// RNG seed; OS entropy when unset.
    pub seed: Option<u64>,

    /// Handling of fatal failures.
    pub failure_policy: FailurePolicy,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            chance: None,
            seed: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl DeviceConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, not valid JSON,
    /// or fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();

        if !path.exists() {
            return Err(IoError::FileNotFound { path: path_str }.into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("{path_str}: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty name or a chance above
    /// [`MAX_RAND`].
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config {
                message: "device name must not be empty".to_string(),
            });
        }
        if let Some(chance) = self.chance
            && chance > MAX_RAND
        {
            return Err(Error::Config {
                message: format!("chance {chance} exceeds maximum {MAX_RAND}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.name, DEFAULT_DEVICE_NAME);
        assert!(config.chance.is_none());
        assert!(config.seed.is_none());
        assert_eq!(config.failure_policy, FailurePolicy::Propagate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_high_chance() {
        let config = DeviceConfig {
            chance: Some(MAX_RAND + 1),
            ..DeviceConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let config = DeviceConfig {
            name: "  ".to_string(),
            ..DeviceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name": "roulette0", "chance": 25, "seed": 9, "failure_policy": "abort"}}"#
        )
        .unwrap();

        let config = DeviceConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "roulette0");
        assert_eq!(config.chance, Some(25));
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_load_missing_file() {
        let err = DeviceConfig::load("/nonexistent/roulette.json").unwrap_err();
        assert!(matches!(err, Error::Io(IoError::FileNotFound { .. })));
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = DeviceConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"chance": 101}}"#).unwrap();
        assert!(DeviceConfig::load(file.path()).is_err());
    }
}
