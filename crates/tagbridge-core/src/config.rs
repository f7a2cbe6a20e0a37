//! Poll configuration store and its schema descriptor.
//!
//! The bridge has a single tunable, `tagReadIntervalMs`. Its bounds live in
//! [`CONFIG_SCHEMA`], which is both advertised to the outside world (rendered
//! as a JSON schema) and used to validate pushed values, so the two cannot
//! drift apart.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use tagbridge_core::PollConfig;
//!
//! let mut config = PollConfig::default();
//! assert_eq!(config.tag_read_interval_ms(), 200);
//!
//! config.apply(&json!({ "tagReadIntervalMs": 500 })).unwrap();
//! assert_eq!(config.tag_read_interval_ms(), 500);
//!
//! // Out of range: rejected, previous value kept
//! assert!(config.apply(&json!({ "tagReadIntervalMs": 70000 })).is_err());
//! assert_eq!(config.tag_read_interval_ms(), 500);
//! ```

use crate::{
    Error, Result,
    constants::{
        DEFAULT_TAG_READ_INTERVAL_MS, JSON_SCHEMA_VERSION, MAX_TAG_READ_INTERVAL_MS,
        MIN_TAG_READ_INTERVAL_MS, TAG_READ_INTERVAL_KEY,
    },
};
use serde_json::{Map, Value, json};
use std::time::Duration;

/// Integer configuration field with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerField {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub minimum: u64,
    pub maximum: u64,
    pub default: u64,
}

impl IntegerField {
    /// Validate a pushed JSON value against the field bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfigValue`] if the value is not a
    /// non-negative integer or lies outside `minimum..=maximum`.
    pub fn validate(&self, value: &Value) -> Result<u64> {
        match value.as_u64() {
            Some(v) if (self.minimum..=self.maximum).contains(&v) => Ok(v),
            _ => Err(self.rejection(value.to_string())),
        }
    }

    /// Validate a plain integer against the field bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfigValue`] if the value is out of range.
    pub fn validate_u64(&self, value: u64) -> Result<u64> {
        if (self.minimum..=self.maximum).contains(&value) {
            Ok(value)
        } else {
            Err(self.rejection(value.to_string()))
        }
    }

    fn rejection(&self, value: String) -> Error {
        Error::InvalidConfigValue {
            key: self.key.to_string(),
            value,
            minimum: self.minimum as i64,
            maximum: self.maximum as i64,
        }
    }

    fn to_json(self) -> Value {
        json!({
            "title": self.title,
            "description": self.description,
            "type": "integer",
            "minimum": self.minimum,
            "maximum": self.maximum,
            "default": self.default,
        })
    }
}

/// Static declaration of every configurable field.
#[derive(Debug)]
pub struct ConfigSchema {
    pub title: &'static str,
    pub fields: &'static [IntegerField],
}

impl ConfigSchema {
    /// Look up a field by key.
    pub fn field(&self, key: &str) -> Option<&IntegerField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Render the schema as a JSON-schema object.
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.key.to_string(), f.to_json()))
            .collect();

        json!({
            "$schema": JSON_SCHEMA_VERSION,
            "title": self.title,
            "type": "object",
            "properties": properties,
        })
    }
}

/// Poll interval field.
pub const TAG_READ_INTERVAL_FIELD: IntegerField = IntegerField {
    key: TAG_READ_INTERVAL_KEY,
    title: "Tag Read Interval (ms)",
    description: "Minimum delay between two reader polls.",
    minimum: MIN_TAG_READ_INTERVAL_MS,
    maximum: MAX_TAG_READ_INTERVAL_MS,
    default: DEFAULT_TAG_READ_INTERVAL_MS,
};

/// Configuration schema advertised once at startup.
pub static CONFIG_SCHEMA: ConfigSchema = ConfigSchema {
    title: "tagbridge",
    fields: &[TAG_READ_INTERVAL_FIELD],
};

/// A committed configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChange {
    TagReadInterval { old: Duration, new: Duration },
}

/// Runtime poll configuration.
///
/// Owned by the polling context; only [`PollConfig::apply`] and
/// [`PollConfig::set_tag_read_interval_ms`] change it, and both validate
/// against [`CONFIG_SCHEMA`] before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    tag_read_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            tag_read_interval_ms: DEFAULT_TAG_READ_INTERVAL_MS,
        }
    }
}

impl PollConfig {
    /// Create a config with a validated interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfigValue`] if the interval is out of range.
    pub fn with_interval_ms(tag_read_interval_ms: u64) -> Result<Self> {
        let tag_read_interval_ms = TAG_READ_INTERVAL_FIELD.validate_u64(tag_read_interval_ms)?;
        Ok(Self {
            tag_read_interval_ms,
        })
    }

    pub fn tag_read_interval_ms(&self) -> u64 {
        self.tag_read_interval_ms
    }

    pub fn tag_read_interval(&self) -> Duration {
        Duration::from_millis(self.tag_read_interval_ms)
    }

    /// Set the interval, returning the change if the value differs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfigValue`] and keeps the current value if
    /// the interval is out of range.
    pub fn set_tag_read_interval_ms(&mut self, value: u64) -> Result<Option<ConfigChange>> {
        let value = TAG_READ_INTERVAL_FIELD.validate_u64(value)?;
        Ok(self.commit_interval(value))
    }

    /// Apply a pushed configuration object.
    ///
    /// Recognized keys are validated first and committed together, so a
    /// rejected push leaves the configuration untouched. Unknown keys are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the push is not a JSON object and
    /// [`Error::InvalidConfigValue`] if a recognized value is rejected.
    pub fn apply(&mut self, push: &Value) -> Result<Vec<ConfigChange>> {
        let object = push
            .as_object()
            .ok_or_else(|| Error::InvalidConfig(format!("expected a JSON object, got {push}")))?;

        let interval = object
            .get(TAG_READ_INTERVAL_KEY)
            .map(|value| TAG_READ_INTERVAL_FIELD.validate(value))
            .transpose()?;

        Ok(interval
            .and_then(|value| self.commit_interval(value))
            .into_iter()
            .collect())
    }

    /// Parse and apply a pushed configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the text is not valid JSON, plus
    /// the errors of [`PollConfig::apply`].
    pub fn apply_str(&mut self, push: &str) -> Result<Vec<ConfigChange>> {
        let value: Value = serde_json::from_str(push)
            .map_err(|e| Error::InvalidConfig(format!("malformed config push: {e}")))?;
        self.apply(&value)
    }

    fn commit_interval(&mut self, value: u64) -> Option<ConfigChange> {
        if value == self.tag_read_interval_ms {
            return None;
        }
        let old = self.tag_read_interval();
        self.tag_read_interval_ms = value;
        Some(ConfigChange::TagReadInterval {
            old,
            new: self.tag_read_interval(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_interval() {
        let config = PollConfig::default();
        assert_eq!(config.tag_read_interval_ms(), 200);
        assert_eq!(config.tag_read_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_apply_accepts_in_range() {
        let mut config = PollConfig::default();
        let changes = config.apply(&json!({ "tagReadIntervalMs": 500 })).unwrap();

        assert_eq!(config.tag_read_interval_ms(), 500);
        assert_eq!(
            changes,
            vec![ConfigChange::TagReadInterval {
                old: Duration::from_millis(200),
                new: Duration::from_millis(500),
            }]
        );
    }

    #[rstest]
    #[case(json!({ "tagReadIntervalMs": 70000 }))]
    #[case(json!({ "tagReadIntervalMs": -1 }))]
    #[case(json!({ "tagReadIntervalMs": 12.5 }))]
    #[case(json!({ "tagReadIntervalMs": "500" }))]
    #[case(json!({ "tagReadIntervalMs": null }))]
    fn test_apply_rejects_invalid_values(#[case] push: Value) {
        let mut config = PollConfig::with_interval_ms(300).unwrap();
        let result = config.apply(&push);

        assert!(matches!(result, Err(Error::InvalidConfigValue { .. })));
        assert_eq!(config.tag_read_interval_ms(), 300);
    }

    #[rstest]
    #[case(0)]
    #[case(60000)]
    fn test_apply_accepts_bounds(#[case] value: u64) {
        let mut config = PollConfig::default();
        config.apply(&json!({ "tagReadIntervalMs": value })).unwrap();
        assert_eq!(config.tag_read_interval_ms(), value);
    }

    #[test]
    fn test_apply_ignores_unknown_keys() {
        let mut config = PollConfig::default();
        let changes = config.apply(&json!({ "ledBrightness": 3 })).unwrap();

        assert!(changes.is_empty());
        assert_eq!(config, PollConfig::default());
    }

    #[test]
    fn test_apply_same_value_reports_no_change() {
        let mut config = PollConfig::default();
        let changes = config.apply(&json!({ "tagReadIntervalMs": 200 })).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_apply_rejects_non_object() {
        let mut config = PollConfig::default();
        assert!(matches!(
            config.apply(&json!([500])),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_apply_str_malformed() {
        let mut config = PollConfig::default();
        assert!(matches!(
            config.apply_str("{tagReadIntervalMs"),
            Err(Error::InvalidConfig(_))
        ));
        assert_eq!(config.tag_read_interval_ms(), 200);
    }

    #[test]
    fn test_with_interval_rejects_out_of_range() {
        assert!(PollConfig::with_interval_ms(60001).is_err());
    }

    #[test]
    fn test_schema_json() {
        let schema = CONFIG_SCHEMA.to_json();

        assert_eq!(schema["$schema"], JSON_SCHEMA_VERSION);
        assert_eq!(schema["type"], "object");

        let field = &schema["properties"]["tagReadIntervalMs"];
        assert_eq!(field["type"], "integer");
        assert_eq!(field["minimum"], 0);
        assert_eq!(field["maximum"], 60000);
        assert_eq!(field["default"], 200);
    }

    #[test]
    fn test_schema_field_lookup() {
        assert_eq!(
            CONFIG_SCHEMA.field("tagReadIntervalMs"),
            Some(&TAG_READ_INTERVAL_FIELD)
        );
        assert!(CONFIG_SCHEMA.field("unknown").is_none());
    }
}
