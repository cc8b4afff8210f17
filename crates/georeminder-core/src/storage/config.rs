//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Position watch options (accuracy, per-fix timeout, fix age)
//! - Alert channels (vibration pattern, notification title, speech)
//! - Defaults for new reminders
//!
//! Configuration is stored at `~/.config/georeminder/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::notify::DispatcherConfig;
use crate::reminder::DEFAULT_RADIUS_METERS;
use crate::tracking::WatchOptions;

/// Position watch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_true")]
    pub high_accuracy: bool,
    /// A fix attempt producing nothing within this window surfaces a timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Oldest cached fix the source may hand back; 0 means always fresh.
    #[serde(default)]
    pub maximum_age_ms: u64,
}

/// Alert configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub vibration: bool,
    #[serde(default = "default_vibration_pattern")]
    pub vibration_pattern: Vec<u64>,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_true")]
    pub speech_enabled: bool,
    /// External text-to-speech program, e.g. `espeak`. The phrase is passed
    /// as the last argument. Speech is skipped when unset.
    #[serde(default)]
    pub speech_command: Option<String>,
    /// `{text}` is replaced with the reminder's spoken phrase.
    #[serde(default = "default_speech_template")]
    pub speech_template: String,
    /// Upper bound on concurrently running alert jobs.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: u32,
}

/// Defaults applied when creating reminders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_radius_meters")]
    pub default_radius_meters: f64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/georeminder/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_vibration_pattern() -> Vec<u64> {
    vec![400, 200, 400]
}
fn default_title() -> String {
    "📍 Arrival Alert".into()
}
fn default_speech_template() -> String {
    "You are near to {text}. Buy the product.".into()
}
fn default_max_in_flight() -> u32 {
    8
}
fn default_radius_meters() -> f64 {
    DEFAULT_RADIUS_METERS
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: default_timeout_ms(),
            maximum_age_ms: 0,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vibration: true,
            vibration_pattern: default_vibration_pattern(),
            title: default_title(),
            speech_enabled: true,
            speech_command: None,
            speech_template: default_speech_template(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            default_radius_meters: DEFAULT_RADIUS_METERS,
        }
    }
}

impl TrackingConfig {
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            high_accuracy: self.high_accuracy,
            timeout_ms: self.timeout_ms,
            maximum_age_ms: self.maximum_age_ms,
        }
    }
}

impl NotificationsConfig {
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            notifications: self.enabled,
            vibration: self.vibration,
            vibration_pattern: self.vibration_pattern.clone(),
            title: self.title.clone(),
            speech: self.speech_enabled,
            speech_template: self.speech_template.clone(),
            max_in_flight: self.max_in_flight.max(1) as usize,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()
            .map_err(|e| ConfigError::DataDir(e.to_string()))?
            .join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing the defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving. Returns error if the key is
    /// unknown or the value does not fit the field.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.tracking.timeout_ms, 10_000);
        assert_eq!(parsed.notifications.vibration_pattern, vec![400, 200, 400]);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[tracking]\ntimeout_ms = 5000\n").unwrap();
        assert_eq!(parsed.tracking.timeout_ms, 5000);
        assert!(parsed.tracking.high_accuracy);
        assert_eq!(parsed.tracking.maximum_age_ms, 0);
        assert_eq!(parsed.reminders.default_radius_meters, 200.0);
        assert_eq!(parsed.notifications.title, "📍 Arrival Alert");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("tracking.high_accuracy").as_deref(), Some("true"));
        assert_eq!(cfg.get("tracking.timeout_ms").as_deref(), Some("10000"));
        assert_eq!(
            cfg.get("notifications.speech_template").as_deref(),
            Some("You are near to {text}. Buy the product.")
        );
        assert!(cfg.get("tracking.missing_key").is_none());
    }

    #[test]
    fn set_value_updates_nested_fields() {
        let mut cfg = Config::default();
        cfg.set_value("tracking.high_accuracy", "false").unwrap();
        cfg.set_value("tracking.timeout_ms", "2500").unwrap();
        cfg.set_value("reminders.default_radius_meters", "75.5").unwrap();
        cfg.set_value("notifications.vibration_pattern", "[100, 50]").unwrap();
        assert!(!cfg.tracking.high_accuracy);
        assert_eq!(cfg.tracking.timeout_ms, 2500);
        assert_eq!(cfg.reminders.default_radius_meters, 75.5);
        assert_eq!(cfg.notifications.vibration_pattern, vec![100, 50]);
    }

    #[test]
    fn set_value_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set_value("tracking.nope", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set_value("tracking.high_accuracy", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set_value("", "1").is_err());
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.tracking.timeout_ms, 10_000);
        assert!(path.exists());

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::LoadFailed { .. })));
    }

    #[test]
    fn converts_into_runtime_options() {
        let cfg = Config::default();
        let watch = cfg.tracking.watch_options();
        assert!(watch.high_accuracy);
        assert_eq!(watch.timeout_ms, 10_000);
        assert_eq!(watch.maximum_age_ms, 0);

        let dispatch = cfg.notifications.dispatcher_config();
        assert_eq!(dispatch.max_in_flight, 8);
        assert_eq!(dispatch.vibration_pattern, vec![400, 200, 400]);
    }
}
