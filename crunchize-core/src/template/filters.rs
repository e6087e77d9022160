use serde_json::Value;

use super::parser::Filter;

/// Applies one filter to `value`. Per the resolution rules, a filter whose
/// operand has the wrong shape is a no-op, never an error.
pub fn apply(value: Value, filter: &Filter) -> Value {
    match filter {
        Filter::Basename => match &value {
            Value::String(s) => Value::String(basename(s)),
            _ => value,
        },
        Filter::Dirname => match &value {
            Value::String(s) => Value::String(dirname(s)),
            _ => value,
        },
        Filter::List => match value {
            Value::Object(map) => Value::Array(map.keys().cloned().map(Value::String).collect()),
            other => other,
        },
        Filter::Replace(old, new) => match &value {
            Value::String(s) => Value::String(s.replace(old.as_str(), new.as_str())),
            _ => value,
        },
        Filter::MapAttribute(attr) => match &value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => map.get(attr).cloned().unwrap_or(Value::Null),
                        _ => Value::Null,
                    })
                    .collect(),
            ),
            _ => value,
        },
    }
}

fn basename(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn dirname(path: &str) -> String {
    std::path::Path::new(path)
        .parent()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn basename_on_path() {
        assert_eq!(
            apply(json!("/a/b/shot.1001.exr"), &Filter::Basename),
            json!("shot.1001.exr")
        );
    }

    #[test]
    fn replace_on_non_string_is_noop() {
        let v = json!(42);
        assert_eq!(
            apply(v.clone(), &Filter::Replace("a".into(), "b".into())),
            v
        );
    }

    #[test]
    fn map_attribute_over_array() {
        let v = json!([{"src": "a"}, {"src": "b"}]);
        assert_eq!(
            apply(v, &Filter::MapAttribute("src".into())),
            json!(["a", "b"])
        );
    }
}
