//! Request-content filtering: XSS denylist stripping and SQL-injection signatures.
//!
//! Both filters are heuristics layered in front of parameterized queries; they
//! are not a substitute for them.

pub mod injection;
pub mod sanitizer;

pub use injection::{contains_sql_injection, find_injection};
pub use sanitizer::{sanitize_str, sanitize_value};

use serde_json::Value;

/// Visit every string leaf of a JSON value, allowing it to be rewritten in place.
///
/// Objects keep their key order; arrays are visited element by element.
pub fn visit_strings_mut<F>(value: &mut Value, f: &mut F)
where
    F: FnMut(&mut String),
{
    match value {
        Value::String(s) => f(s),
        Value::Array(items) => {
            for item in items.iter_mut() {
                visit_strings_mut(item, f);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                visit_strings_mut(item, f);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Depth-first search for the first string leaf matching `pred`.
///
/// Returns the dot-joined key path of the match, with array elements named by
/// index. `prefix` seeds the path (e.g. `query`); an empty prefix yields bare keys.
pub fn find_string_leaf<P>(value: &Value, prefix: &str, pred: &P) -> Option<String>
where
    P: Fn(&str) -> bool,
{
    match value {
        Value::String(s) => pred(s).then(|| prefix.to_string()),
        Value::Array(items) => items.iter().enumerate().find_map(|(index, item)| {
            find_string_leaf(item, &join_path(prefix, &index.to_string()), pred)
        }),
        Value::Object(map) => map
            .iter()
            .find_map(|(key, item)| find_string_leaf(item, &join_path(prefix, key), pred)),
        Value::Null | Value::Bool(_) | Value::Number(_) => None,
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}
