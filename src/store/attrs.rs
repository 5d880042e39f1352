//! Helpers over loosely-typed attribute maps.
//!
//! Items written by different generations of the ingestion code carry the
//! same fact under different names (`FacilityId` vs `facility_id`) and with
//! different types (number vs numeric string). These helpers read them with
//! explicit alias lists instead of ad-hoc `get` chains.

use serde_json::{Map, Number, Value};

use super::{AttributeValue, Item};

// ---

/// Null and empty-string values count as absent.
pub fn is_blank(value: &AttributeValue) -> bool {
    match value {
        AttributeValue::Null(_) => true,
        AttributeValue::S(s) => s.is_empty(),
        _ => false,
    }
}

/// Return the first non-blank value among `keys`.
pub fn first_present<'a>(item: &'a Item, keys: &[&str]) -> Option<&'a AttributeValue> {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .find(|value| !is_blank(value))
}

/// Convert a stored value to `f64`.
///
/// DynamoDB numbers arrive as decimal strings; numeric strings are accepted
/// too. Anything else, or a non-finite result, yields `None`.
pub fn to_f64(value: &AttributeValue) -> Option<f64> {
    // ---
    let parsed = match value {
        AttributeValue::N(n) => n.trim().parse::<f64>().ok(),
        AttributeValue::S(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub fn first_f64(item: &Item, keys: &[&str]) -> Option<f64> {
    first_present(item, keys).and_then(to_f64)
}

/// Textual form of a scalar value (strings and numbers).
pub fn to_text(value: &AttributeValue) -> Option<String> {
    match value {
        AttributeValue::S(s) => Some(s.clone()),
        AttributeValue::N(n) => Some(n.clone()),
        _ => None,
    }
}

pub fn first_string(item: &Item, keys: &[&str]) -> Option<String> {
    first_present(item, keys).and_then(to_text)
}

/// Boolean flag, tolerating numeric and textual encodings.
pub fn first_bool(item: &Item, keys: &[&str]) -> Option<bool> {
    // ---
    match first_present(item, keys)? {
        AttributeValue::Bool(b) => Some(*b),
        AttributeValue::N(n) => n.parse::<f64>().ok().map(|v| v != 0.0),
        AttributeValue::S(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// String key attribute (`pk`, `sk`, ...).
pub fn key_string<'a>(item: &'a Item, key: &str) -> Option<&'a str> {
    match item.get(key) {
        Some(AttributeValue::S(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Entries of an email-like list attribute.
///
/// Accepts a list of strings, a string set, or a comma-separated string.
/// Entries are trimmed and blanks dropped. Returns `None` for any other type.
pub fn string_entries(value: &AttributeValue) -> Option<Vec<String>> {
    // ---
    let raw: Vec<&str> = match value {
        AttributeValue::L(list) => list
            .iter()
            .filter_map(|v| match v {
                AttributeValue::S(s) => Some(s.as_str()),
                _ => None,
            })
            .collect(),
        AttributeValue::Ss(set) => set.iter().map(String::as_str).collect(),
        AttributeValue::S(csv) => csv.split(',').collect(),
        _ => return None,
    };

    Some(
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

pub fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

pub fn n(value: f64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

// ---

/// Render an item as JSON for HTTP responses.
pub fn item_to_json(item: &Item) -> Value {
    Value::Object(
        item.iter()
            .map(|(k, v)| (k.clone(), attr_to_json(v)))
            .collect::<Map<String, Value>>(),
    )
}

pub fn attr_to_json(value: &AttributeValue) -> Value {
    // ---
    match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number_to_json(n),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(list) => Value::Array(list.iter().map(attr_to_json).collect()),
        AttributeValue::M(map) => item_to_json(map),
        AttributeValue::Ss(set) => Value::Array(set.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(set) => Value::Array(set.iter().map(|n| number_to_json(n)).collect()),
        _ => Value::Null,
    }
}

fn number_to_json(n: &str) -> Value {
    // ---
    if let Ok(i) = n.parse::<i64>() {
        return Value::Number(i.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or_else(|| Value::String(n.to_string()), Value::Number)
}

/// Convert an inbound JSON value to a stored attribute.
///
/// Numbers keep their decimal text so no precision is lost on the way in.
pub fn json_to_attr(value: &Value) -> AttributeValue {
    // ---
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(json_to_attr).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_attr(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn item(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn first_present_skips_blank_values() {
        // ---
        let it = item(&[
            ("MinTemperature", AttributeValue::Null(true)),
            ("mintemperature", AttributeValue::N("12.5".into())),
        ]);
        assert_eq!(first_f64(&it, &["MinTemperature", "mintemperature"]), Some(12.5));

        let empty = item(&[("FacilityId", s("")), ("facility_id", s("f-1"))]);
        assert_eq!(
            first_string(&empty, &["FacilityId", "facility_id"]).as_deref(),
            Some("f-1")
        );
    }

    #[test]
    fn numeric_conversion_never_fails_loudly() {
        // ---
        assert_eq!(to_f64(&AttributeValue::N("35".into())), Some(35.0));
        assert_eq!(to_f64(&s(" 21.5 ")), Some(21.5));
        assert_eq!(to_f64(&s("warm")), None);
        assert_eq!(to_f64(&s("NaN")), None);
        assert_eq!(to_f64(&AttributeValue::Bool(true)), None);
    }

    #[test]
    fn bool_flags_accept_common_encodings() {
        // ---
        let it = item(&[
            ("a", AttributeValue::Bool(true)),
            ("b", AttributeValue::N("0".into())),
            ("c", s("TRUE")),
        ]);
        assert_eq!(first_bool(&it, &["a"]), Some(true));
        assert_eq!(first_bool(&it, &["b"]), Some(false));
        assert_eq!(first_bool(&it, &["c"]), Some(true));
        assert_eq!(first_bool(&it, &["missing"]), None);
    }

    #[test]
    fn string_entries_handles_list_set_and_csv() {
        // ---
        let csv = s("a@x.com, ,b@x.com");
        assert_eq!(string_entries(&csv).unwrap(), vec!["a@x.com", "b@x.com"]);

        let list = AttributeValue::L(vec![s(" c@x.com "), AttributeValue::N("1".into()), s("")]);
        assert_eq!(string_entries(&list).unwrap(), vec!["c@x.com"]);

        let set = AttributeValue::Ss(vec!["d@x.com".into()]);
        assert_eq!(string_entries(&set).unwrap(), vec!["d@x.com"]);

        assert!(string_entries(&AttributeValue::Bool(false)).is_none());
    }

    #[test]
    fn json_conversion_keeps_numbers_as_numbers() {
        // ---
        let attr = json_to_attr(&json!({"temperature": 21.5, "count": 3, "ok": true}));
        let AttributeValue::M(map) = &attr else {
            panic!("expected a map");
        };
        assert_eq!(map.get("temperature"), Some(&AttributeValue::N("21.5".into())));

        let back = item_to_json(map);
        assert_eq!(back, json!({"temperature": 21.5, "count": 3, "ok": true}));
    }
}
