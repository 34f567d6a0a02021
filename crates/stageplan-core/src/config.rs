//! Read-only planner options.
//!
//! Options are a flat string map; consumers read them through typed
//! accessors against keys that declare their own defaults. The map is
//! immutable once handed to the planner, so one instance may be shared by
//! compilations running in parallel.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable prefix understood by [`PlannerOptions::from_env`].
pub const ENV_PREFIX: &str = "STAGEPLAN_";

/// A declared option: its key and the value used when the key is absent.
#[derive(Debug, Clone, Copy)]
pub struct OptionKey<T: 'static> {
    pub name: &'static str,
    pub default: T,
}

impl<T> OptionKey<T> {
    pub const fn new(name: &'static str, default: T) -> Self {
        Self { name, default }
    }
}

/// Numeric size declared for TINY external inputs (no default).
pub const SIZE_TINY: OptionKey<Option<f64>> = OptionKey::new("estimate.size.tiny", None);
/// Numeric size declared for SMALL external inputs (no default).
pub const SIZE_SMALL: OptionKey<Option<f64>> = OptionKey::new("estimate.size.small", None);
/// Numeric size declared for LARGE external inputs (no default).
pub const SIZE_LARGE: OptionKey<Option<f64>> = OptionKey::new("estimate.size.large", None);
/// Largest estimated input (bytes) that may be broadcast to a join.
pub const BROADCAST_LIMIT: OptionKey<f64> =
    OptionKey::new("broadcast.limit", 10.0 * 1024.0 * 1024.0);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlannerOptions {
    values: BTreeMap<String, String>,
}

impl PlannerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used while assembling options.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    /// Create options from environment variables.
    ///
    /// `STAGEPLAN_BROADCAST_LIMIT=1024` becomes `broadcast.limit = "1024"`:
    /// the prefix is stripped, the rest lowercased, and `_` mapped to `.`.
    pub fn from_env() -> Self {
        let mut opts = Self::default();
        for (k, v) in std::env::vars() {
            if let Some(rest) = k.strip_prefix(ENV_PREFIX) {
                let key = rest.to_ascii_lowercase().replace('_', ".");
                opts.values.insert(key, v);
            }
        }
        opts
    }

    /// Parse a YAML mapping of option keys to scalar values.
    pub fn from_yaml(src: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(src)?;
        let mut opts = Self::default();
        for (k, v) in raw {
            let text = match v {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(Error::Config(format!(
                        "option '{k}' must be a scalar, got {other:?}"
                    )))
                }
            };
            opts.values.insert(k, text);
        }
        Ok(opts)
    }

    /// Layer `other` on top of `self`; keys in `other` win.
    pub fn merged(mut self, other: &PlannerOptions) -> Self {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_str(&self, key: &OptionKey<&'static str>) -> String {
        self.get_raw(key.name)
            .map(str::to_string)
            .unwrap_or_else(|| key.default.to_string())
    }

    pub fn get_f64(&self, key: &OptionKey<f64>) -> Result<f64> {
        self.parse_or(key.name, key.default)
    }

    pub fn get_opt_f64(&self, key: &OptionKey<Option<f64>>) -> Result<Option<f64>> {
        match self.get_raw(key.name) {
            Some(s) => parse_value(key.name, s).map(Some),
            None => Ok(key.default),
        }
    }

    pub fn get_usize(&self, key: &OptionKey<usize>) -> Result<usize> {
        self.parse_or(key.name, key.default)
    }

    pub fn get_bool(&self, key: &OptionKey<bool>) -> Result<bool> {
        self.parse_or(key.name, key.default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn parse_or<T: FromStr>(&self, name: &str, default: T) -> Result<T> {
        match self.get_raw(name) {
            Some(s) => parse_value(name, s),
            None => Ok(default),
        }
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| Error::Config(format!("option '{name}' has malformed value '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_defaults_apply_when_absent() {
        let opts = PlannerOptions::new();
        assert_eq!(opts.get_f64(&BROADCAST_LIMIT).unwrap(), 10.0 * 1024.0 * 1024.0);
        assert_eq!(opts.get_opt_f64(&SIZE_TINY).unwrap(), None);
    }

    #[test]
    fn typed_accessors_parse_values() {
        let opts = PlannerOptions::new()
            .with("broadcast.limit", 2048)
            .with("estimate.size.tiny", "12.5");
        assert_eq!(opts.get_f64(&BROADCAST_LIMIT).unwrap(), 2048.0);
        assert_eq!(opts.get_opt_f64(&SIZE_TINY).unwrap(), Some(12.5));
    }

    #[test]
    fn malformed_value_is_config_error() {
        let opts = PlannerOptions::new().with("broadcast.limit", "lots");
        let err = opts.get_f64(&BROADCAST_LIMIT).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn yaml_scalars_become_options() {
        let opts = PlannerOptions::from_yaml(
            "estimate.size.tiny: 12\nbroadcast.limit: 1e3\nverbose: true\n",
        )
        .unwrap();
        assert_eq!(opts.get_opt_f64(&SIZE_TINY).unwrap(), Some(12.0));
        assert_eq!(opts.get_f64(&BROADCAST_LIMIT).unwrap(), 1000.0);
        let verbose = OptionKey::new("verbose", false);
        assert!(opts.get_bool(&verbose).unwrap());
    }

    #[test]
    fn yaml_rejects_nested_values() {
        let err = PlannerOptions::from_yaml("estimate:\n  size: 1\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn merged_prefers_overrides() {
        let base = PlannerOptions::new().with("broadcast.limit", 1);
        let over = PlannerOptions::new().with("broadcast.limit", 2);
        let merged = base.merged(&over);
        assert_eq!(merged.get_raw("broadcast.limit"), Some("2"));
    }

    #[test]
    fn from_env_strips_prefix_and_maps_separators() {
        std::env::set_var("STAGEPLAN_TEST_FROM_ENV_LIMIT", "42");
        std::env::set_var("OTHER_TEST_FROM_ENV_LIMIT", "7");
        let opts = PlannerOptions::from_env();
        std::env::remove_var("STAGEPLAN_TEST_FROM_ENV_LIMIT");
        std::env::remove_var("OTHER_TEST_FROM_ENV_LIMIT");

        assert_eq!(opts.get_raw("test.from.env.limit"), Some("42"));
        assert!(opts.get_raw("STAGEPLAN_TEST_FROM_ENV_LIMIT").is_none());
        assert!(opts.get_raw("other.test.from.env.limit").is_none());
    }
}
