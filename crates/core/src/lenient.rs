//! Tolerant decoders for backend JSON.
//!
//! The checklist endpoint is loose about scalar types: ids and quantities come
//! as numbers or strings, flags as booleans or 0/1, arrays may be `null` or
//! missing. Malformed pieces degrade to empty values instead of failing the
//! whole checklist.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Render a scalar as text. `null` becomes the empty string.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Interpret a scalar as a flag: `true`, non-zero numbers, `"1"` and `"true"`.
pub fn scalar_to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "on" | "yes"),
        _ => false,
    }
}

pub fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value))
}

pub fn optional_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        other => Some(scalar_to_string(&other)).filter(|s| !s.is_empty()),
    })
}

pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_bool(&value))
}

/// Raw JSON array, or empty when the key holds anything else.
pub fn raw_array<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

/// Typed array where elements that fail to decode are dropped.
pub fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = raw_array(deserializer)?;
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(index, %err, "dropping malformed schema entry");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "string_or_number")]
        text: String,
        #[serde(default, deserialize_with = "flag")]
        on: bool,
        #[serde(default, deserialize_with = "raw_array")]
        items: Vec<Value>,
        #[serde(default, deserialize_with = "optional_string")]
        color: Option<String>,
    }

    #[test]
    fn scalars_coerce() {
        let probe: Probe =
            serde_json::from_value(json!({"text": 12.5, "on": 1, "items": null, "color": ""}))
                .unwrap();
        assert_eq!(probe.text, "12.5");
        assert!(probe.on);
        assert!(probe.items.is_empty());
        assert_eq!(probe.color, None);
    }

    #[test]
    fn missing_keys_default() {
        let probe: Probe = serde_json::from_value(json!({})).unwrap();
        assert_eq!(probe.text, "");
        assert!(!probe.on);
    }

    #[test]
    fn string_flags() {
        assert!(scalar_to_bool(&json!("1")));
        assert!(scalar_to_bool(&json!("true")));
        assert!(!scalar_to_bool(&json!("0")));
        assert!(!scalar_to_bool(&json!(null)));
    }
}
