//! Request data sources and argument resolution.
//!
//! Three buckets feed an operation's arguments: path segments (positional,
//! or `key=value` named), allow-listed query pairs, and the JSON body.
//! Resolution walks the descriptor's parameter table in order and upcasts
//! each value to the kind of its declared default; anything that does not
//! cast falls back to the default. The core validates semantics, the
//! gateway only shapes.

use std::collections::{HashMap, VecDeque};

use serde_json::{Map, Value};

use crate::commands::{
    CommandRegistry, OperationDescriptor, ParamSource, ParamSpec, ParamValue, ScalarKind,
};

#[derive(Debug, Clone, Default)]
pub struct DataSources {
    path_positional: VecDeque<String>,
    path_named: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Map<String, Value>,
}

impl DataSources {
    /// Buckets the raw request surfaces. Query keys outside the registry's
    /// allow-list are dropped here and never reach argument resolution.
    pub fn collect(
        registry: &CommandRegistry,
        path_args: Vec<String>,
        raw_query: Option<&str>,
        body: Option<Map<String, Value>>,
    ) -> Self {
        let mut path_positional = VecDeque::new();
        let mut path_named = HashMap::new();
        for segment in path_args {
            match split_key_value(&segment) {
                Some((key, value)) => {
                    path_named.insert(key, value);
                }
                None => path_positional.push_back(segment),
            }
        }
        let mut query = HashMap::new();
        for (key, value) in parse_query(raw_query.unwrap_or_default()) {
            if registry.allows_query_key(&key) {
                query.insert(key, value);
            }
        }
        Self {
            path_positional,
            path_named,
            query,
            body: body.unwrap_or_default(),
        }
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    fn take_path(&mut self, name: &str) -> Option<Raw> {
        if let Some(value) = self.path_named.remove(name) {
            return Some(Raw::Text(value));
        }
        self.path_positional.pop_front().map(Raw::Text)
    }

    fn take_query(&self, name: &str) -> Option<Raw> {
        self.query.get(name).cloned().map(Raw::Text)
    }

    fn take_body(&self, name: &str) -> Option<Raw> {
        self.body.get(name).cloned().map(Raw::Json)
    }
}

/// Resolves the positional argument list in descriptor order.
pub fn resolve_args(descriptor: &OperationDescriptor, sources: &mut DataSources) -> Vec<ParamValue> {
    descriptor
        .params
        .iter()
        .map(|spec| resolve_param(spec, sources))
        .collect()
}

fn resolve_param(spec: &ParamSpec, sources: &mut DataSources) -> ParamValue {
    let raw = match spec.source {
        ParamSource::Path => sources.take_path(spec.name),
        ParamSource::Query => sources.take_query(spec.name),
        ParamSource::Body => sources.take_body(spec.name),
    };
    match raw {
        Some(raw) => cast(&raw, &spec.default),
        None => spec.default.clone(),
    }
}

#[derive(Debug, Clone)]
enum Raw {
    Text(String),
    Json(Value),
}

fn cast(raw: &Raw, target: &ParamValue) -> ParamValue {
    match target {
        ParamValue::Number(_) => match number_from(raw) {
            Some(n) => ParamValue::Number(n),
            None => target.clone(),
        },
        ParamValue::Bool(_) => match bool_from(raw) {
            Some(flag) => ParamValue::Bool(flag),
            None => target.clone(),
        },
        ParamValue::Text(_) => match text_from(raw) {
            Some(text) => ParamValue::Text(text),
            None => target.clone(),
        },
        ParamValue::List { element, .. } => ParamValue::List {
            element: *element,
            items: list_from(raw, *element),
        },
    }
}

fn number_from(raw: &Raw) -> Option<i64> {
    match raw {
        Raw::Text(text) => text.trim().parse().ok(),
        Raw::Json(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Raw::Json(Value::String(text)) => text.trim().parse().ok(),
        Raw::Json(Value::Bool(flag)) => Some(i64::from(*flag)),
        Raw::Json(_) => None,
    }
}

fn bool_from(raw: &Raw) -> Option<bool> {
    match raw {
        Raw::Text(text) => bool_from_text(text),
        Raw::Json(Value::Bool(flag)) => Some(*flag),
        Raw::Json(Value::Number(n)) => Some(n.as_i64().is_some_and(|v| v != 0)),
        Raw::Json(Value::String(text)) => bool_from_text(text),
        Raw::Json(_) => None,
    }
}

fn bool_from_text(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn text_from(raw: &Raw) -> Option<String> {
    match raw {
        Raw::Text(text) => Some(text.clone()),
        Raw::Json(Value::String(text)) => Some(text.clone()),
        Raw::Json(Value::Number(n)) => Some(n.to_string()),
        Raw::Json(Value::Bool(flag)) => Some(flag.to_string()),
        Raw::Json(_) => None,
    }
}

fn list_from(raw: &Raw, element: ScalarKind) -> Vec<ParamValue> {
    match raw {
        // Comma-separated text is the query-string list form.
        Raw::Text(text) => text
            .split(',')
            .filter_map(|part| scalar_from(&Raw::Text(part.trim().to_string()), element))
            .collect(),
        Raw::Json(Value::Array(items)) => items
            .iter()
            .filter_map(|item| scalar_from(&Raw::Json(item.clone()), element))
            .collect(),
        // A bare scalar wraps into a one-element list.
        Raw::Json(_) => scalar_from(raw, element).into_iter().collect(),
    }
}

fn scalar_from(raw: &Raw, kind: ScalarKind) -> Option<ParamValue> {
    match kind {
        ScalarKind::Number => number_from(raw).map(ParamValue::Number),
        ScalarKind::Bool => bool_from(raw).map(ParamValue::Bool),
        ScalarKind::Text => text_from(raw).map(ParamValue::Text),
    }
}

fn split_key_value(segment: &str) -> Option<(String, String)> {
    let (key, value) = segment.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (percent_decode(key), percent_decode(value)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> CommandRegistry {
        CommandRegistry::builtin()
    }

    fn sources(path: &[&str], query: Option<&str>, body: Option<Value>) -> DataSources {
        let body = body.and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        });
        DataSources::collect(
            &test_registry(),
            path.iter().map(|s| (*s).to_string()).collect(),
            query,
            body,
        )
    }

    #[test]
    fn positional_and_named_path_segments_split() {
        let mut sources = sources(&["42", "name=web"], None, None);
        match sources.take_path("name") {
            Some(Raw::Text(text)) => assert_eq!(text, "web"),
            other => panic!("expected named segment, got {other:?}"),
        }
        match sources.take_path("id") {
            Some(Raw::Text(text)) => assert_eq!(text, "42"),
            other => panic!("expected positional text, got {other:?}"),
        }
    }

    #[test]
    fn unknown_query_keys_are_dropped() {
        let sources = sources(&[], Some("filter=1&bogus_key=7&zone=0"), None);
        assert_eq!(sources.query_value("filter"), Some("1"));
        assert_eq!(sources.query_value("zone"), Some("0"));
        assert_eq!(sources.query_value("bogus_key"), None);
    }

    #[test]
    fn query_values_percent_decode() {
        let sources = sources(&[], Some("filter=a%20b+c"), None);
        assert_eq!(sources.query_value("filter"), Some("a b c"));
    }

    #[test]
    fn args_resolve_in_descriptor_order_with_defaults() {
        let registry = test_registry();
        let descriptor = registry.resolve("vm", "pool.info").unwrap();
        let mut sources = sources(&[], None, None);
        let args = resolve_args(descriptor, &mut sources);
        assert_eq!(
            args,
            vec![
                ParamValue::Number(-2),
                ParamValue::Number(-1),
                ParamValue::Number(-1),
                ParamValue::Number(-1),
            ]
        );
    }

    #[test]
    fn path_id_and_body_fields_fill_their_slots() {
        let registry = test_registry();
        let descriptor = registry.resolve("vm", "deploy").unwrap();
        let mut sources = sources(
            &["42"],
            None,
            Some(serde_json::json!({"host": 3, "enforce": true})),
        );
        let args = resolve_args(descriptor, &mut sources);
        assert_eq!(
            args,
            vec![
                ParamValue::Number(42),
                ParamValue::Number(3),
                ParamValue::Bool(true),
                ParamValue::Number(-1),
            ]
        );
    }

    #[test]
    fn uncastable_values_fall_back_to_the_default() {
        let registry = test_registry();
        let descriptor = registry.resolve("vm", "pool.info").unwrap();
        // The value "bogusKey=1" is not a number, so filter resolves to -2.
        let mut sources = sources(&[], Some("filter=bogusKey%3D1"), None);
        let args = resolve_args(descriptor, &mut sources);
        assert_eq!(args[0], ParamValue::Number(-2));
    }

    #[test]
    fn permissive_upcasts_cover_the_scalar_shapes() {
        assert_eq!(number_from(&Raw::Text(" 42 ".to_string())), Some(42));
        assert_eq!(number_from(&Raw::Json(Value::from(3.9))), Some(3));
        assert_eq!(bool_from(&Raw::Text("YES".to_string())), Some(true));
        assert_eq!(bool_from(&Raw::Json(Value::from(0))), Some(false));
        assert_eq!(
            text_from(&Raw::Json(Value::from(7))),
            Some("7".to_string())
        );
        assert_eq!(text_from(&Raw::Json(Value::Null)), None);
    }

    #[test]
    fn lists_accept_arrays_scalars_and_comma_text() {
        let from_array = list_from(
            &Raw::Json(serde_json::json!([1, "5", true])),
            ScalarKind::Number,
        );
        assert_eq!(
            from_array,
            vec![
                ParamValue::Number(1),
                ParamValue::Number(5),
                ParamValue::Number(1),
            ]
        );
        let from_text = list_from(&Raw::Text("1, 2,junk,3".to_string()), ScalarKind::Number);
        assert_eq!(
            from_text,
            vec![
                ParamValue::Number(1),
                ParamValue::Number(2),
                ParamValue::Number(3),
            ]
        );
        let wrapped = list_from(&Raw::Json(Value::from(9)), ScalarKind::Number);
        assert_eq!(wrapped, vec![ParamValue::Number(9)]);
    }

    #[test]
    fn group_list_param_resolves_from_a_json_array() {
        let registry = test_registry();
        let descriptor = registry.resolve("user", "group.set").unwrap();
        let mut sources = sources(&["7"], None, Some(serde_json::json!({"groups": [1, 4]})));
        let args = resolve_args(descriptor, &mut sources);
        assert_eq!(args[0], ParamValue::Number(7));
        assert_eq!(
            args[1],
            ParamValue::List {
                element: ScalarKind::Number,
                items: vec![ParamValue::Number(1), ParamValue::Number(4)],
            }
        );
    }
}
