//! YAML value → JSON value conversion.

use serde_json::{Map, Value};

/// Convert a `serde_yaml` value into a `serde_json` value.
///
/// Non-string mapping keys are stringified; tagged values are unwrapped to
/// their inner value; non-finite floats become null (JSON cannot carry them).
pub fn yaml_to_json(yaml: serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(yaml_key_to_string(&k), yaml_to_json(v));
            }
            Value::Object(out)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key_to_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_scalars_and_nesting() {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            "a: 1\nb: \"2\"\nc: true\nd:\n  - x\n  - 2.5\n",
        )
        .unwrap();
        let json = yaml_to_json(yaml);
        assert_eq!(json, json!({"a": 1, "b": "2", "c": true, "d": ["x", 2.5]}));
    }

    #[test]
    fn non_string_keys_are_stringified() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("80: http\ntrue: yes\n").unwrap();
        let json = yaml_to_json(yaml);
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("80"));
        assert!(obj.contains_key("true"));
    }
}
