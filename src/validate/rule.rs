//! Rule parsing and evaluation.
//!
//! A rule string is a `|`-separated list of `name` or `name:param` items:
//!
//! ```text
//! require|max:25|between:1,120|regex:/^[a-z]+$/
//! ```
//!
//! `regex` swallows everything after it, so a pattern may itself contain `|`.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde_json::{Map, Value};

/// One parsed rule: `max:25` → `{ name: "max", param: "25" }`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Rule {
    /// The rule name as written (`>=`, `bool`, `same`, ...).
    pub(crate) name: String,
    pub(crate) param: String,
}

impl Rule {
    /// The canonical name used for default messages and dispatch.
    pub(crate) fn canonical(&self) -> &str {
        match self.name.as_str() {
            "bool" => "boolean",
            "same" | "=" => "eq",
            ">=" => "egt",
            ">" => "gt",
            "<=" => "elt",
            "<" => "lt",
            other => other,
        }
    }

    /// `require` and `accepted` are the only rules that look at absent values.
    pub(crate) fn checks_empty(&self) -> bool {
        matches!(self.canonical(), "require" | "accepted")
    }
}

pub(crate) fn parse_rules(rule_str: &str) -> Vec<Rule> {
    let mut rules = Vec::new();
    let mut segments = rule_str.split('|');

    while let Some(segment) = segments.next() {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (name, param) = match segment.split_once(':') {
            Some((name, param)) => (name.trim(), param.to_owned()),
            None => (segment, String::new()),
        };
        if name == "regex" {
            let rest: Vec<&str> = segments.by_ref().collect();
            let mut pattern = param;
            for part in rest {
                pattern.push('|');
                pattern.push_str(part);
            }
            rules.push(Rule { name: name.to_owned(), param: pattern });
            break;
        }
        rules.push(Rule { name: name.to_owned(), param });
    }

    rules
}

/// Looks up `field` in `data`, following `a.b.c` into nested objects.
pub(crate) fn lookup<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    if let Some(v) = data.get(field) {
        return Some(v);
    }
    let mut parts = field.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Null, missing and the empty string count as "not provided".
pub(crate) fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// String form used by textual rules. Numbers keep their JSON spelling.
pub(crate) fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn size_of(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => as_text(other).chars().count(),
    }
}

/// Resolves a comparison operand: a field name present in `data`, or a literal.
fn operand(data: &Map<String, Value>, param: &str) -> Value {
    lookup(data, param).cloned().unwrap_or_else(|| Value::String(param.to_owned()))
}

fn bounds(param: &str) -> Option<(f64, f64)> {
    let (lo, hi) = param.split_once(',')?;
    Some((lo.trim().parse().ok()?, hi.trim().parse().ok()?))
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .unwrap_or_else(|e| panic!("invalid email pattern: {e}"))
});

/// Compiles a rule pattern. `/pattern/flags` is used verbatim (only `i` is
/// honoured); a bare pattern is anchored to the whole value.
fn compile_pattern(param: &str) -> Option<Regex> {
    let pattern = if let Some(body) = param.strip_prefix('/') {
        let end = body.rfind('/')?;
        let (inner, flags) = (&body[..end], &body[end + 1..]);
        if flags.contains('i') {
            format!("(?i){inner}")
        } else {
            inner.to_owned()
        }
    } else {
        format!("^(?:{param})$")
    };
    Regex::new(&pattern).ok()
}

/// Evaluates one rule against a present, non-blank value (or any value for
/// `require`/`accepted`).
///
/// Returns `None` for an unknown rule name.
pub(crate) fn evaluate(
    rule: &Rule,
    field: &str,
    value: Option<&Value>,
    data: &Map<String, Value>,
) -> Option<bool> {
    let empty = Value::Null;
    let v = value.unwrap_or(&empty);
    let text = as_text(v);
    let param = rule.param.as_str();

    let ok = match rule.canonical() {
        "require" => match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            _ => true,
        },
        "accepted" => matches!(v, Value::Bool(true))
            || matches!(text.as_str(), "1" | "on" | "yes" | "true"),
        "number" => !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()),
        "integer" => text.trim().parse::<i64>().is_ok(),
        "float" => text.trim().parse::<f64>().is_ok(),
        "boolean" => matches!(v, Value::Bool(_))
            || matches!(text.as_str(), "0" | "1" | "true" | "false"),
        "array" => v.is_array() || v.is_object(),
        "email" => EMAIL.is_match(&text),
        "url" => url::Url::parse(&text).is_ok_and(|u| u.has_host()),
        "ip" => match (text.parse::<IpAddr>(), param) {
            (Ok(IpAddr::V4(_)), "ipv4" | "") => true,
            (Ok(IpAddr::V6(_)), "ipv6" | "") => true,
            _ => false,
        },
        "alpha" => !text.is_empty() && text.chars().all(|c| c.is_ascii_alphabetic()),
        "alphaNum" => !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric()),
        "alphaDash" => {
            !text.is_empty()
                && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        "in" => param.split(',').any(|item| item.trim() == text),
        "notIn" => !param.split(',').any(|item| item.trim() == text),
        "between" => match (as_number(v), bounds(param)) {
            (Some(n), Some((lo, hi))) => n >= lo && n <= hi,
            _ => false,
        },
        "notBetween" => match (as_number(v), bounds(param)) {
            (Some(n), Some((lo, hi))) => n < lo || n > hi,
            _ => false,
        },
        "length" => {
            let len = size_of(v);
            match param.split_once(',') {
                Some((lo, hi)) => match (lo.trim().parse::<usize>(), hi.trim().parse::<usize>()) {
                    (Ok(lo), Ok(hi)) => len >= lo && len <= hi,
                    _ => false,
                },
                None => param.trim().parse::<usize>().is_ok_and(|n| len == n),
            }
        }
        "max" => param.trim().parse::<usize>().is_ok_and(|n| size_of(v) <= n),
        "min" => param.trim().parse::<usize>().is_ok_and(|n| size_of(v) >= n),
        "confirm" => {
            let other = if !param.is_empty() {
                param.to_owned()
            } else if let Some(base) = field.split_once("_confirm").map(|(base, _)| base) {
                base.to_owned()
            } else {
                format!("{field}_confirm")
            };
            lookup(data, &other).is_some_and(|o| as_text(o) == text)
        }
        "different" => lookup(data, param).is_none_or(|o| as_text(o) != text),
        "eq" => text == param,
        "egt" | "gt" | "elt" | "lt" => {
            match (as_number(v), as_number(&operand(data, param))) {
                (Some(a), Some(b)) => match rule.canonical() {
                    "egt" => a >= b,
                    "gt" => a > b,
                    "elt" => a <= b,
                    _ => a < b,
                },
                _ => false,
            }
        }
        "regex" => compile_pattern(param).is_some_and(|re| re.is_match(&text)),
        _ => return None,
    };

    Some(ok)
}

/// Default message template for a canonical rule name.
pub(crate) fn default_message(canonical: &str) -> &'static str {
    match canonical {
        "require" => ":attribute is required",
        "accepted" => ":attribute must be accepted",
        "number" => ":attribute must be numeric",
        "integer" => ":attribute must be an integer",
        "float" => ":attribute must be a float",
        "boolean" => ":attribute must be a boolean",
        "array" => ":attribute must be an array",
        "email" => ":attribute is not a valid email address",
        "url" => ":attribute is not a valid url",
        "ip" => ":attribute is not a valid ip address",
        "alpha" => ":attribute must contain letters only",
        "alphaNum" => ":attribute must contain letters and digits only",
        "alphaDash" => ":attribute must contain letters, digits, dashes and underscores only",
        "in" => ":attribute must be in :rule",
        "notIn" => ":attribute must not be in :rule",
        "between" => ":attribute must be between :1 and :2",
        "notBetween" => ":attribute must not be between :1 and :2",
        "length" => ":attribute length must be :rule",
        "max" => ":attribute length must not exceed :rule",
        "min" => ":attribute length must be at least :rule",
        "confirm" => ":attribute does not match its confirmation",
        "different" => ":attribute must differ from :rule",
        "eq" => ":attribute must equal :rule",
        "egt" => ":attribute must be greater than or equal to :rule",
        "gt" => ":attribute must be greater than :rule",
        "elt" => ":attribute must be less than or equal to :rule",
        "lt" => ":attribute must be less than :rule",
        "regex" => ":attribute has an invalid format",
        _ => ":attribute failed unknown rule :rule",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn eval(rule_str: &str, field: &str, d: &Map<String, Value>) -> bool {
        let rule = parse_rules(rule_str).remove(0);
        evaluate(&rule, field, lookup(d, field), d).unwrap()
    }

    #[test]
    fn parses_names_and_params() {
        let rules = parse_rules("require|max:25| between:1,5 ");
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[1], Rule { name: "max".into(), param: "25".into() });
        assert_eq!(rules[2].param, "1,5");
    }

    #[test]
    fn regex_keeps_pipes() {
        let rules = parse_rules("require|regex:^(a|b)$");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].param, "^(a|b)$");
    }

    #[test]
    fn nested_lookup() {
        let d = data(json!({"user": {"name": "ann"}}));
        assert_eq!(lookup(&d, "user.name"), Some(&json!("ann")));
        assert_eq!(lookup(&d, "user.age"), None);
    }

    #[test]
    fn require_and_number() {
        let d = data(json!({"a": "", "b": "0", "c": "12x", "d": 42}));
        assert!(!eval("require", "a", &d));
        assert!(eval("require", "b", &d));
        assert!(!eval("number", "c", &d));
        assert!(eval("number", "d", &d));
    }

    #[test]
    fn length_family_counts_chars() {
        let d = data(json!({"name": "héllo", "tags": [1, 2, 3]}));
        assert!(eval("max:5", "name", &d));
        assert!(!eval("max:4", "name", &d));
        assert!(eval("length:3", "tags", &d));
        assert!(eval("length:2,5", "name", &d));
    }

    #[test]
    fn comparisons_resolve_fields_or_literals() {
        let d = data(json!({"min": 3, "max": 10, "age": "18"}));
        assert!(eval("gt:min", "max", &d));
        assert!(eval(">=:18", "age", &d));
        assert!(!eval("lt:10", "age", &d));
    }

    #[test]
    fn confirm_defaults_to_suffix_field() {
        let d = data(json!({"password": "s3cret", "password_confirm": "s3cret"}));
        assert!(eval("confirm", "password", &d));
        assert!(eval("confirm", "password_confirm", &d));
        let bad = data(json!({"password": "s3cret", "password_confirm": "nope"}));
        assert!(!eval("confirm", "password", &bad));
    }

    #[test]
    fn formats() {
        let d = data(json!({
            "mail": "ann@example.com",
            "site": "https://example.com/x",
            "addr": "::1",
            "code": "AB12",
        }));
        assert!(eval("email", "mail", &d));
        assert!(eval("url", "site", &d));
        assert!(eval("ip", "addr", &d));
        assert!(!eval("ip:ipv4", "addr", &d));
        assert!(eval("regex:/^[a-z0-9]+$/i", "code", &d));
        assert!(!eval("regex:[a-z0-9]+", "code", &d));
    }

    #[test]
    fn unknown_rule_is_reported() {
        let d = Map::new();
        let rule = Rule { name: "frobnicate".into(), param: String::new() };
        assert_eq!(evaluate(&rule, "x", None, &d), None);
    }
}
