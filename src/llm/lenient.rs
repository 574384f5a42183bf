//! Lenient field deserializers for model-generated JSON.
//!
//! The model's output shape is advisory only. A field with the wrong type
//! becomes `None` instead of failing the whole object.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use super::types::NutritionNote;
use serde_json::Value;

/// Any JSON value that `T` accepts, otherwise `None`.
pub fn any<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Strings pass through; numbers and booleans are rendered as text.
pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

/// A list of strings. A bare string becomes a one-element list and
/// non-text entries are dropped.
pub fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => Some(items.iter().filter_map(value_to_string).collect()),
        Value::String(s) => Some(vec![s]),
        _ => None,
    })
}

/// Numbers, or strings that parse as numbers ("4.5").
pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Booleans, or the strings "true"/"false" in any case.
pub fn boolean<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// A nutrition note: objects are read as a breakdown, scalars as text.
pub fn nutrition<'de, D>(deserializer: D) -> Result<Option<NutritionNote>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(_) => serde_json::from_value(value).ok().map(NutritionNote::Detailed),
        other => value_to_string(&other).map(NutritionNote::Summary),
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "super::string")]
        name: Option<String>,
        #[serde(default, deserialize_with = "super::string_list")]
        steps: Option<Vec<String>>,
        #[serde(default, deserialize_with = "super::number")]
        score: Option<f64>,
        #[serde(default, deserialize_with = "super::boolean")]
        ok: Option<bool>,
    }

    fn probe(json: &str) -> Probe {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn wrong_types_become_none() {
        let p = probe(r#"{"name": {"x": 1}, "steps": 7, "score": [], "ok": null}"#);
        assert!(p.name.is_none());
        assert!(p.steps.is_none());
        assert!(p.score.is_none());
        assert!(p.ok.is_none());
    }

    #[test]
    fn scalars_are_coerced() {
        let p = probe(r#"{"name": 42, "steps": "stir", "score": " 4.5 ", "ok": "TRUE"}"#);
        assert_eq!(p.name.as_deref(), Some("42"));
        assert_eq!(p.steps, Some(vec!["stir".to_string()]));
        assert_eq!(p.score, Some(4.5));
        assert_eq!(p.ok, Some(true));
    }

    #[test]
    fn list_drops_non_text_entries() {
        let p = probe(r#"{"steps": ["chop", null, {"a": 1}, 2]}"#);
        assert_eq!(p.steps, Some(vec!["chop".to_string(), "2".to_string()]));
    }

    #[test]
    fn missing_fields_default_to_none() {
        let p = probe("{}");
        assert!(p.name.is_none() && p.steps.is_none());
    }
}
