// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Flat key/value configuration record handed to regions at construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::region::ConfigError;

/// Immutable-after-construction configuration of one region
///
/// Values are scalars (numbers, booleans, strings). Nested objects and arrays are
/// rejected so every region sees the same flat shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionConfig(BTreeMap<String, Value>);

impl RegionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Parse a JSON object such as `{"columnCount": 2048, "seed": 1956}`
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| ConfigError::NotFlat(e.to_string()))?;
        Self::from_value(value)
    }

    /// Flatten any serializable struct whose fields are scalars
    pub fn from_serializable<T: Serialize>(section: &T) -> Result<Self, ConfigError> {
        let value =
            serde_json::to_value(section).map_err(|e| ConfigError::NotFlat(e.to_string()))?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self, ConfigError> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(ConfigError::NotFlat(format!(
                    "expected an object, got {}",
                    type_name(&other)
                )))
            }
        };
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            if value.is_object() || value.is_array() {
                return Err(ConfigError::NotFlat(format!(
                    "key '{key}' holds {}",
                    type_name(&value)
                )));
            }
            entries.insert(key, value);
        }
        Ok(Self(entries))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| invalid_type(key, "a number", value)),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid_type(key, "a non-negative integer", value)),
        }
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        match self.get_u64(key)? {
            None => Ok(None),
            Some(v) => usize::try_from(v)
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("{v} does not fit in usize"),
                }),
        }
    }

    /// Booleans also accept 0 / 1, the way mode flags are usually written
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(value) => match value.as_u64() {
                Some(0) => Ok(Some(false)),
                Some(1) => Ok(Some(true)),
                _ => Err(invalid_type(key, "a boolean", value)),
            },
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(value) => Err(invalid_type(key, "a string", value)),
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        Ok(self.get_f64(key)?.unwrap_or(default))
    }

    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        Ok(self.get_u64(key)?.unwrap_or(default))
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        Ok(self.get_usize(key)?.unwrap_or(default))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        Ok(self.get_bool(key)?.unwrap_or(default))
    }

    pub fn require_usize(&self, key: &str) -> Result<usize, ConfigError> {
        self.get_usize(key)?
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// Keys present in the record but not in `known`
    pub fn unknown_keys(&self, known: &[&str]) -> Vec<&str> {
        self.keys()
            .filter(|k| !known.iter().any(|n| n == k))
            .collect()
    }
}

impl FromIterator<(String, Value)> for RegionConfig {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn invalid_type(key: &str, expected: &'static str, found: &Value) -> ConfigError {
    ConfigError::InvalidType {
        key: key.to_string(),
        expected,
        found: type_name(found).to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
