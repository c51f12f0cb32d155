//! Stringification and path traversal over JSON values.
//!
//! `serde_json::Value` is the single dynamic value type flowing through the
//! template engine. Two rules live here and nowhere else: how a value turns
//! into prompt text, and how a dotted path walks into a value.

use serde_json::Value;

/// Convert an evaluated value into the text that replaces a placeholder.
///
/// `None` (no value) and JSON null become the empty string; strings pass
/// through unchanged; numbers and booleans use their literal form; arrays
/// and objects are serialized as compact JSON, degrading to the empty
/// string if serialization fails.
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Walk a pre-split path into a value.
///
/// One traversal rule for both container kinds: a numeric segment indexes
/// into an array, and the same segment text addresses an object key
/// verbatim. Traversal through a scalar or past a missing key yields
/// `None`, never an error.
pub fn traverse<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Split a raw dotted path into segments, folding bracket indices into
/// dot form (`data[0].title` becomes `data`, `0`, `title`). Empty segments
/// are dropped.
pub fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        while let Some(open) = rest.find('[') {
            if !rest[..open].is_empty() {
                segments.push(rest[..open].to_string());
            }
            match rest[open..].find(']') {
                Some(close) => {
                    let index = &rest[open + 1..open + close];
                    if !index.is_empty() {
                        segments.push(index.to_string());
                    }
                    rest = &rest[open + close + 1..];
                }
                None => {
                    rest = "";
                }
            }
        }
        if !rest.is_empty() {
            segments.push(rest.to_string());
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stringify_scalars() {
        assert_eq!(stringify(None), "");
        assert_eq!(stringify(Some(&Value::Null)), "");
        assert_eq!(stringify(Some(&json!("hello"))), "hello");
        assert_eq!(stringify(Some(&json!(42))), "42");
        assert_eq!(stringify(Some(&json!(1.5))), "1.5");
        assert_eq!(stringify(Some(&json!(true))), "true");
    }

    #[test]
    fn test_stringify_containers_compact_json() {
        assert_eq!(stringify(Some(&json!(["a", "b"]))), r#"["a","b"]"#);
        assert_eq!(stringify(Some(&json!({"k": 1}))), r#"{"k":1}"#);
    }

    #[test]
    fn test_traverse_object_and_array() {
        let data = json!({"foo": {"bar": [1, 2, 3], "baz": "hello"}});

        assert_eq!(
            traverse(&data, &["foo", "baz"]),
            Some(&json!("hello"))
        );
        assert_eq!(traverse(&data, &["foo", "bar", "0"]), Some(&json!(1)));
        assert_eq!(traverse(&data, &["foo", "bar", "2"]), Some(&json!(3)));
    }

    #[test]
    fn test_traverse_numeric_key_on_object() {
        let data = json!({"0": "zeroth"});
        assert_eq!(traverse(&data, &["0"]), Some(&json!("zeroth")));
    }

    #[test]
    fn test_traverse_missing_or_scalar_is_none() {
        let data = json!({"a": 1});
        assert_eq!(traverse(&data, &["missing"]), None);
        assert_eq!(traverse(&data, &["a", "deeper"]), None);
        assert_eq!(traverse(&data, &["a", "0"]), None);
    }

    #[test]
    fn test_split_path_brackets() {
        assert_eq!(split_path("data[0].title"), vec!["data", "0", "title"]);
        assert_eq!(split_path("a.b.c"), vec!["a", "b", "c"]);
        assert_eq!(split_path("items[10]"), vec!["items", "10"]);
        assert_eq!(split_path(""), Vec::<String>::new());
    }
}
