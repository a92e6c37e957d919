use std::collections::HashMap;

use serde_json::json;
use zbus::zvariant::{OwnedValue, Value};

/// VeDbus text representation: integers as-is, floats with two decimals,
/// invalid (null) as `---`
pub fn format_text_value(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "---".to_string(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) if n.is_f64() => {
            format!("{:.2}", n.as_f64().unwrap_or_default())
        }
        other => other.to_string(),
    }
}

fn owned(value: Value<'_>) -> OwnedValue {
    // Only fails for file descriptors, which are never built here
    OwnedValue::try_from(value).unwrap_or_else(|_| OwnedValue::from(0i64))
}

/// Empty `ai` array, the VeDbus encoding of an invalid value
fn invalid_value() -> Value<'static> {
    Value::from(Vec::<i32>::new())
}

pub fn text_owned_value(val: &serde_json::Value) -> OwnedValue {
    owned(Value::from(format_text_value(val)))
}

pub fn serde_to_owned_value(v: &serde_json::Value) -> OwnedValue {
    owned(serde_to_value(v))
}

/// Integers go out as `i` when they fit, like velib does, else `x`/`t`
fn number_value(n: &serde_json::Number) -> Value<'static> {
    match (n.as_i64(), n.as_u64()) {
        (Some(i), _) => match i32::try_from(i) {
            Ok(small) => Value::from(small),
            Err(_) => Value::from(i),
        },
        (None, Some(u)) => Value::from(u),
        _ => Value::from(n.as_f64().unwrap_or_default()),
    }
}

fn serde_to_value(v: &serde_json::Value) -> Value<'static> {
    match v {
        serde_json::Value::Null => invalid_value(),
        serde_json::Value::Bool(b) => Value::from(*b),
        serde_json::Value::Number(n) => number_value(n),
        serde_json::Value::String(s) => Value::from(s.clone()),
        serde_json::Value::Array(items) if items.is_empty() => invalid_value(),
        serde_json::Value::Array(items) => array_value(items),
        serde_json::Value::Object(map) => {
            let entries: HashMap<String, Value<'static>> = map
                .iter()
                .map(|(k, v)| (k.clone(), serde_to_value(v)))
                .collect();
            Value::from(entries)
        }
    }
}

/// Homogeneous arrays keep a typed signature (`ai`, `ad`, `as`, `ab`);
/// anything mixed goes out as `av`
fn array_value(items: &[serde_json::Value]) -> Value<'static> {
    if let Some(ints) = items
        .iter()
        .map(|v| v.as_i64().and_then(|i| i32::try_from(i).ok()))
        .collect::<Option<Vec<i32>>>()
    {
        return Value::from(ints);
    }
    if let Some(floats) = items
        .iter()
        .map(serde_json::Value::as_f64)
        .collect::<Option<Vec<f64>>>()
    {
        return Value::from(floats);
    }
    if let Some(strings) = items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<String>>>()
    {
        return Value::from(strings);
    }
    if let Some(bools) = items
        .iter()
        .map(serde_json::Value::as_bool)
        .collect::<Option<Vec<bool>>>()
    {
        return Value::from(bools);
    }
    Value::from(items.iter().map(serde_to_value).collect::<Vec<Value<'static>>>())
}

/// Convert a value written by a bus client. An empty array is the VeDbus
/// invalid marker and maps to `Null`.
pub fn owned_value_to_serde(v: &OwnedValue) -> serde_json::Value {
    value_to_serde(v)
}

fn value_to_serde(v: &Value<'_>) -> serde_json::Value {
    match v {
        Value::Bool(b) => json!(b),
        Value::U8(n) => json!(n),
        Value::I16(n) => json!(n),
        Value::U16(n) => json!(n),
        Value::I32(n) => json!(n),
        Value::U32(n) => json!(n),
        Value::I64(n) => json!(n),
        Value::U64(n) => json!(n),
        Value::F64(n) => json!(n),
        Value::Str(s) => json!(s.as_str()),
        Value::ObjectPath(p) => json!(p.as_str()),
        Value::Signature(s) => json!(s.to_string()),
        Value::Array(a) if a.is_empty() => serde_json::Value::Null,
        Value::Array(a) => serde_json::Value::Array(a.iter().map(value_to_serde).collect()),
        Value::Dict(d) => serde_json::Value::Object(
            d.iter()
                .map(|(k, v)| (key_to_string(k), value_to_serde(v)))
                .collect(),
        ),
        Value::Structure(s) => {
            serde_json::Value::Array(s.fields().iter().map(value_to_serde).collect())
        }
        Value::Value(inner) => value_to_serde(inner),
        // File descriptors carry no value worth storing
        #[allow(unreachable_patterns)]
        _ => serde_json::Value::Null,
    }
}

/// Dict keys are basic types; strings keep their text, numbers their digits
fn key_to_string(key: &Value<'_>) -> String {
    match value_to_serde(key) {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_formatting() {
        assert_eq!(format_text_value(&serde_json::Value::Null), "---");
        assert_eq!(format_text_value(&serde_json::json!(4350)), "4350");
        assert_eq!(format_text_value(&serde_json::json!(10.87)), "10.87");
        assert_eq!(format_text_value(&serde_json::json!(1234.567)), "1234.57");
        assert_eq!(format_text_value(&serde_json::json!("Enphase")), "Enphase");
    }

    #[test]
    fn null_round_trips_as_invalid() {
        let ov = serde_to_owned_value(&serde_json::Value::Null);
        assert_eq!(ov.value_signature(), "ai");
        assert_eq!(owned_value_to_serde(&ov), serde_json::Value::Null);
    }

    #[test]
    fn primitive_conversions() {
        let ov_b = serde_to_owned_value(&serde_json::json!(true));
        assert_eq!(owned_value_to_serde(&ov_b), serde_json::json!(true));

        let ov_i = serde_to_owned_value(&serde_json::json!(-5));
        assert_eq!(owned_value_to_serde(&ov_i), serde_json::json!(-5));

        let ov_f = serde_to_owned_value(&serde_json::json!(std::f64::consts::PI));
        assert_eq!(
            owned_value_to_serde(&ov_f),
            serde_json::json!(std::f64::consts::PI)
        );

        let ov_s = serde_to_owned_value(&serde_json::json!("abc"));
        assert_eq!(owned_value_to_serde(&ov_s), serde_json::json!("abc"));
    }

    #[test]
    fn integers_go_out_as_int32_when_they_fit() {
        assert_eq!(serde_to_owned_value(&serde_json::json!(4350)).value_signature(), "i");
        assert_eq!(
            serde_to_owned_value(&serde_json::json!(5_000_000_000i64)).value_signature(),
            "x"
        );
        assert_eq!(serde_to_owned_value(&serde_json::json!(2.5)).value_signature(), "d");
    }

    #[test]
    fn narrow_integer_types_from_remote_clients() {
        assert_eq!(
            owned_value_to_serde(&OwnedValue::from(5000i32)),
            serde_json::json!(5000)
        );
        assert_eq!(
            owned_value_to_serde(&OwnedValue::from(2u8)),
            serde_json::json!(2)
        );
        assert_eq!(
            owned_value_to_serde(&OwnedValue::from(7u32)),
            serde_json::json!(7)
        );
    }

    #[test]
    fn arrays_from_clients_become_json_arrays() {
        let ints = OwnedValue::try_from(Value::from(vec![1i32, 2])).unwrap();
        assert_eq!(owned_value_to_serde(&ints), serde_json::json!([1, 2]));

        let back = serde_to_owned_value(&serde_json::json!([1, 2]));
        assert_eq!(back.value_signature(), "ai");
        assert_eq!(
            serde_to_owned_value(&serde_json::json!(["a", "b"])).value_signature(),
            "as"
        );
        assert_eq!(
            serde_to_owned_value(&serde_json::json!([1, "b"])).value_signature(),
            "av"
        );
        let mixed = serde_to_owned_value(&serde_json::json!([1, "b"]));
        assert_eq!(owned_value_to_serde(&mixed), serde_json::json!([1, "b"]));
    }

    #[test]
    fn dicts_from_clients_become_json_objects() {
        let mut map = HashMap::new();
        map.insert("limit".to_string(), 3000i32);
        map.insert("phase".to_string(), 1i32);
        let dict = OwnedValue::from(map);
        assert_eq!(
            owned_value_to_serde(&dict),
            serde_json::json!({"limit": 3000, "phase": 1})
        );

        let out = serde_to_owned_value(&serde_json::json!({"limit": 3000, "name": "x"}));
        assert_eq!(out.value_signature(), "a{sv}");
        assert_eq!(
            owned_value_to_serde(&out),
            serde_json::json!({"limit": 3000, "name": "x"})
        );
    }
}
