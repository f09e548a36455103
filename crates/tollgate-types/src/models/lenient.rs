//! Tolerant field deserializers for configuration values.
//!
//! Tenant configurations are edited by hand and often carry scalars as
//! strings (`"true"`, `"512"`). These accept both the native JSON type and
//! its string form.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Deserialize a bool, number, or string-parsable enum from its JSON form or
/// from a string.
pub fn scalar<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromStr,
    T::Err: fmt::Display,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => s.trim().to_ascii_lowercase().parse().map_err(de::Error::custom),
        other => serde_json::from_value(other).map_err(de::Error::custom),
    }
}

/// Deserialize a list of strings from an array or a comma-separated string.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()),
        other => serde_json::from_value(other).map_err(de::Error::custom),
    }
}
