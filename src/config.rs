//! Kiosk configuration
//!
//! Loaded from JSON with camelCase keys. Every field has a default, so an
//! empty object yields the built-in television-remote setup.

use crate::error::{KioskError, Result};
use crate::policy::LockdownPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for a `Kiosk`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskConfig {
    /// Lockdown policy shared by all components
    #[serde(default)]
    pub policy: LockdownPolicy,

    /// Upper bound on a single pinning request before falling back
    #[serde(default = "default_pinning_timeout_ms")]
    pub pinning_timeout_ms: u64,

    /// Buffer size of the notification and navigation channels
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

fn default_pinning_timeout_ms() -> u64 {
    2000
}

fn default_notification_capacity() -> usize {
    64
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            policy: LockdownPolicy::default(),
            pinning_timeout_ms: default_pinning_timeout_ms(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

impl KioskConfig {
    /// Use a custom policy with default tuning
    pub fn with_policy(policy: LockdownPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn pinning_timeout(&self) -> Duration {
        Duration::from_millis(self.pinning_timeout_ms)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: KioskConfig = serde_json::from_str(json)
            .map_err(|e| KioskError::Config(format!("Failed to parse kiosk config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            KioskError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), "Kiosk config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pinning_timeout_ms == 0 {
            return Err(KioskError::Config(
                "Pinning timeout must be greater than zero".to_string(),
            ));
        }
        if self.notification_capacity == 0 {
            return Err(KioskError::Config(
                "Notification capacity must be greater than zero".to_string(),
            ));
        }
        self.policy.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputClass;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = KioskConfig::from_json("{}").unwrap();
        assert_eq!(config.pinning_timeout(), Duration::from_secs(2));
        assert_eq!(config.notification_capacity, 64);
        assert_eq!(config.policy, LockdownPolicy::default());
    }

    #[test]
    fn test_nested_policy() {
        let config = KioskConfig::from_json(
            r#"{"pinningTimeoutMs": 150, "policy": {"allowedInputClasses": ["select"]}}"#,
        )
        .unwrap();
        assert_eq!(config.pinning_timeout_ms, 150);
        assert!(config.policy.is_allowed_input(InputClass::Select));
        assert!(!config.policy.is_allowed_input(InputClass::Up));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = KioskConfig::from_json(r#"{"pinningTimeoutMs": 0}"#).unwrap_err();
        assert!(matches!(err, KioskError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = KioskConfig::from_json("{ not json").unwrap_err();
        assert!(err.to_string().contains("Failed to parse kiosk config"));
    }

    #[test]
    fn test_from_file() {
        let dir = std::env::temp_dir().join(format!("a3s-kiosk-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("kiosk.json");
        std::fs::write(&path, r#"{"notificationCapacity": 8}"#).unwrap();

        let config = KioskConfig::from_file(&path).unwrap();
        assert_eq!(config.notification_capacity, 8);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_from_file_missing() {
        let err = KioskConfig::from_file("/tmp/nonexistent-a3s-kiosk.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
