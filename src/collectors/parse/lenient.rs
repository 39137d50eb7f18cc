//! Field deserializers that never fail: anything unparsable becomes the zero value.

use crate::collectors::util::{coerce_f64, coerce_limit};
use serde::Deserializer;
use serde::de::{self, Visitor};
use std::fmt;

struct Text;

impl Visitor<'_> for Text {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string, number, bool or null")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_unit<E: de::Error>(self) -> Result<String, E> {
        Ok(String::new())
    }

    fn visit_none<E: de::Error>(self) -> Result<String, E> {
        Ok(String::new())
    }
}

/// Any scalar as its string form; `null` becomes `""`.
///
/// # Errors
///
/// Only fails for non-scalar input (arrays, objects).
pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    deserializer.deserialize_any(Text)
}

/// A number, or `0.0` when the value is missing or unparsable.
///
/// # Errors
///
/// Only fails for non-scalar input (arrays, objects).
pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    string(deserializer).map(|raw| coerce_f64(&raw))
}

/// A job-slot limit where `-` means unlimited (`-1`).
///
/// # Errors
///
/// Only fails for non-scalar input (arrays, objects).
pub fn limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    string(deserializer).map(|raw| coerce_limit(&raw))
}
