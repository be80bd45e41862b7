//! `fn inspect` output: tab-indented JSON, optionally narrowed by a dotted
//! path.

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use crate::error::{Error, Result};

/// Walk `path` through `value`. Keys may themselves contain dots, so at
/// each level the longest run of segments naming an existing key wins
/// (`annotations.fnproject.io/fn/invokeEndpoint`).
pub fn select<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = value;
    let mut i = 0;
    while i < segments.len() {
        let obj = current.as_object()?;
        let (next, used) = (i + 1..=segments.len())
            .rev()
            .find_map(|end| {
                let key = segments[i..end].join(".");
                obj.get(&key).map(|v| (v, end))
            })?;
        current = next;
        i = used;
    }
    Some(current)
}

/// Pretty-print with a tab indent and a trailing newline.
pub fn to_tab_json(value: &Value) -> std::result::Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Render `item` (or its field at `path`) for display.
pub fn render<T: Serialize>(kind: &'static str, item: &T, path: Option<&str>) -> Result<String> {
    let value = serde_json::to_value(item).map_err(|e| Error::Render { kind, source: e })?;
    let selected = match path.filter(|p| !p.is_empty()) {
        Some(p) => select(&value, p).ok_or(Error::Inspect { kind })?,
        None => &value,
    };
    to_tab_json(selected).map_err(|e| Error::Render { kind, source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn function() -> Value {
        json!({
            "name": "hello",
            "config": {"A": "1"},
            "annotations": {"fnproject.io/fn/invokeEndpoint": "http://localhost:8080/invoke/01ABC"}
        })
    }

    #[test]
    fn keys_containing_dots_are_matched_greedily() {
        let v = function();
        assert_eq!(
            select(&v, "annotations.fnproject.io/fn/invokeEndpoint"),
            Some(&json!("http://localhost:8080/invoke/01ABC"))
        );
    }

    #[test]
    fn nested_plain_keys() {
        let v = function();
        assert_eq!(select(&v, "config.A"), Some(&json!("1")));
        assert_eq!(select(&v, "config.B"), None);
        assert_eq!(select(&v, "name.length"), None);
    }

    #[test]
    fn whole_object_is_tab_indented() {
        let out = render("function", &json!({"name": "hello"}), None).unwrap();
        assert_eq!(out, "{\n\t\"name\": \"hello\"\n}\n");
    }

    #[test]
    fn unresolvable_path_names_the_kind() {
        let err = render("app", &json!({"name": "a"}), Some("nope")).unwrap_err();
        assert_eq!(err.to_string(), "failed to inspect that app's field");
    }
}
