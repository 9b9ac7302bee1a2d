//! Parsing helpers for provider responses. Exchange APIs are inconsistent about sending numbers as JSON numbers or
//! as strings, so both are accepted. Numbers are converted through their textual form, never through `f64` math.
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tsg_common::Amount;

pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.parse::<Amount>().ok().map(|a| a.value()),
        Value::Number(n) => n.to_string().parse::<Amount>().ok().map(|a| a.value()),
        _ => None,
    }
}

pub fn flexible_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let value = Value::deserialize(deserializer)?;
    decimal_from_value(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid decimal value: {value}")))
}

/// Ids are sometimes sent as numbers.
pub fn flexible_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::default()),
        v => Err(serde::de::Error::custom(format!("expected a string or number, got {v}"))),
    }
}
