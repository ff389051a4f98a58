//! Key casing for values returned by the gateway.
//!
//! The gateway answers with CamelCase object keys (`Alias`, `DNSServer`,
//! `AdvancedDMZhost`). Unless `--keep-keys` is given, values are printed and
//! matched with snake_case keys instead.

use serde_json::{Map, Value};

/// Convert a single CamelCase key to snake_case.
///
/// A word boundary is placed before an uppercase letter that follows a
/// lowercase letter or digit, and before the last capital of an acronym
/// that is followed by a lowercase letter (`DNSServer` -> `dns_server`).
pub fn decamelize(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Recursively rewrite every object key in `value` with [`decamelize`].
pub fn decamelize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (decamelize(&k), decamelize_keys(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(decamelize_keys).collect()),
        other => other,
    }
}
