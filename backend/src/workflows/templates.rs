// Value helpers - path lookup, loose coercions and `{{path}}` interpolation
//
// Coercions follow the loose rules rule authors already rely on: values are
// stringified and numbers coerced the way a JavaScript runtime would do it.

use regex::{Captures, Regex};
use serde_json::{Number, Value};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"));

/// Walk a dot-separated path. Any non-container intermediate yields `None`.
pub fn resolve_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// String form of a possibly-missing value. Missing is `"undefined"`.
pub fn loose_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(v) => value_to_string(v),
    }
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => value_to_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn number_to_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    format_float(n.as_f64().unwrap_or(f64::NAN))
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if f == 0.0 {
        // covers -0
        "0".to_string()
    } else {
        f.to_string()
    }
}

/// Numeric coercion. Missing values and unparseable strings become NaN.
pub fn loose_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => {
            if *b { 1.0 } else { 0.0 }
        }
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => parse_number(s),
        Some(v @ Value::Array(_)) => parse_number(&value_to_string(v)),
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let lower = trimmed.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|n| n as f64)
                .unwrap_or(f64::NAN);
        }
    }

    // Rust accepts "inf" and "nan" spellings that must stay NaN here
    if trimmed
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return f64::NAN;
    }

    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Missing, null, false, 0, NaN and "" are falsy.
pub fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64().is_none_or(|f| f == 0.0 || f.is_nan()),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => false,
    }
}

/// Replace every `{{path}}` with the value found at that path in `data`.
/// Unresolved paths (and nulls) become the empty string.
pub fn interpolate(template: &str, data: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            match resolve_path(data, caps[1].trim()) {
                None | Some(Value::Null) => String::new(),
                Some(value) => value_to_string(value),
            }
        })
        .into_owned()
}
