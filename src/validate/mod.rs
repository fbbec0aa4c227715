//! Rule-based validation of request input.
//!
//! A [`Validate`] is built either inline from `(field, rules)` pairs or from a
//! named [`ValidatorDef`] registered on the [`App`](crate::App). Controllers
//! reach it through [`Base::validate`](crate::Base::validate).
//!
//! ```rust
//! use keel::{Messages, Validate};
//! use serde_json::json;
//!
//! let mut v = Validate::new([("name|Name", "require|max:5")], Messages::new());
//! let data = json!({ "name": "much too long" });
//! assert!(!v.check(data.as_object().unwrap()));
//! assert_eq!(v.error().unwrap().to_string(), "Name length must not exceed 5");
//! ```

mod rule;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use rule::{Rule, default_message, evaluate, is_blank, lookup, parse_rules};

/// Message overrides keyed by `field.rule` or `field`.
pub type Messages = HashMap<String, String>;

// ── ValidationErrors ──────────────────────────────────────────────────────────

/// What a failed check reports.
///
/// Serialises as a bare string in single mode and as a `field → message`
/// object in batch mode.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValidationErrors {
    /// First failure only (the default).
    Single(String),
    /// First failure of every failing field, in rule order.
    Batch(IndexMap<String, String>),
}

impl ValidationErrors {
    /// The first message, whichever mode produced it.
    pub fn first(&self) -> &str {
        match self {
            Self::Single(msg) => msg,
            Self::Batch(map) => map.values().next().map(String::as_str).unwrap_or(""),
        }
    }

    /// Message for one field. A single-mode error has no field association.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Self::Single(_) => None,
            Self::Batch(map) => map.get(name).map(String::as_str),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(msg) => f.write_str(msg),
            Self::Batch(map) => {
                let joined: Vec<&str> = map.values().map(String::as_str).collect();
                f.write_str(&joined.join("; "))
            }
        }
    }
}

// ── Validate ──────────────────────────────────────────────────────────────────

struct FieldRules {
    field: String,
    label: Option<String>,
    rules: Vec<Rule>,
}

impl FieldRules {
    /// `"name|User name"` → field `name`, label `User name`.
    fn parse(key: &str, rule_str: &str) -> Self {
        let (field, label) = match key.split_once('|') {
            Some((field, label)) => (field.trim().to_owned(), Some(label.trim().to_owned())),
            None => (key.trim().to_owned(), None),
        };
        Self { field, label, rules: parse_rules(rule_str) }
    }
}

/// A configured validator.
pub struct Validate {
    fields: Vec<FieldRules>,
    messages: Messages,
    scenes: HashMap<String, Vec<String>>,
    scene: Option<String>,
    batch: bool,
    error: Option<ValidationErrors>,
}

impl Validate {
    pub fn new<K, R, M, T>(
        rules: impl IntoIterator<Item = (K, R)>,
        messages: impl IntoIterator<Item = (M, T)>,
    ) -> Self
    where
        K: AsRef<str>,
        R: AsRef<str>,
        M: Into<String>,
        T: Into<String>,
    {
        Self {
            fields: rules
                .into_iter()
                .map(|(k, r)| FieldRules::parse(k.as_ref(), r.as_ref()))
                .collect(),
            messages: messages.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            scenes: HashMap::new(),
            scene: None,
            batch: false,
            error: None,
        }
    }

    /// Adds (or extends) the rules for one field.
    pub fn rule(mut self, key: &str, rule_str: &str) -> Self {
        let parsed = FieldRules::parse(key, rule_str);
        match self.fields.iter_mut().find(|f| f.field == parsed.field) {
            Some(existing) => {
                existing.rules.extend(parsed.rules);
                if parsed.label.is_some() {
                    existing.label = parsed.label;
                }
            }
            None => self.fields.push(parsed),
        }
        self
    }

    pub fn message(mut self, key: impl Into<String>, msg: impl Into<String>) -> Self {
        self.messages.insert(key.into(), msg.into());
        self
    }

    /// Selects the scene to check. An undefined scene leaves every rule active.
    pub fn scene(&mut self, name: &str) -> &mut Self {
        self.scene = Some(name.to_owned());
        self
    }

    pub fn batch(&mut self, batch: bool) -> &mut Self {
        self.batch = batch;
        self
    }

    /// Runs the rules against `data`. On failure the errors are kept and
    /// available through [`error`](Self::error).
    pub fn check(&mut self, data: &Map<String, Value>) -> bool {
        self.error = None;

        let scoped: Option<&Vec<String>> = match &self.scene {
            Some(name) => {
                let fields = self.scenes.get(name);
                if fields.is_none() {
                    debug!(scene = %name, "scene not defined, checking every field");
                }
                fields
            }
            None => None,
        };

        let mut failures: IndexMap<String, String> = IndexMap::new();

        for entry in &self.fields {
            if scoped.is_some_and(|only| !only.iter().any(|f| f == &entry.field)) {
                continue;
            }
            if let Some(msg) = self.check_field(entry, data) {
                if !self.batch {
                    self.error = Some(ValidationErrors::Single(msg));
                    return false;
                }
                failures.insert(entry.field.clone(), msg);
            }
        }

        if failures.is_empty() {
            true
        } else {
            self.error = Some(ValidationErrors::Batch(failures));
            false
        }
    }

    pub fn error(&self) -> Option<&ValidationErrors> {
        self.error.as_ref()
    }

    pub fn into_error(self) -> Option<ValidationErrors> {
        self.error
    }

    /// First failing rule's message for `entry`, if any.
    fn check_field(&self, entry: &FieldRules, data: &Map<String, Value>) -> Option<String> {
        let value = lookup(data, &entry.field);
        let blank = is_blank(value);
        if blank && !entry.rules.iter().any(Rule::checks_empty) {
            return None;
        }

        for rule in &entry.rules {
            match evaluate(rule, &entry.field, value, data) {
                Some(true) => {}
                Some(false) => return Some(self.message_for(entry, rule)),
                None => {
                    warn!(field = %entry.field, rule = %rule.name, "unknown validation rule");
                    return Some(self.message_for(entry, rule));
                }
            }
        }
        None
    }

    fn message_for(&self, entry: &FieldRules, rule: &Rule) -> String {
        let field = &entry.field;
        let template = self
            .messages
            .get(&format!("{field}.{}", rule.name))
            .or_else(|| self.messages.get(&format!("{field}.{}", rule.canonical())))
            .or_else(|| self.messages.get(field.as_str()))
            .map(String::as_str)
            .unwrap_or_else(|| default_message(rule.canonical()));

        let attribute = entry.label.as_deref().unwrap_or(field);
        let mut msg = template.replace(":attribute", attribute);
        let parts: Vec<&str> = rule.param.split(',').collect();
        for (i, part) in parts.iter().enumerate().take(3) {
            msg = msg.replace(&format!(":{}", i + 1), part.trim());
        }
        msg.replace(":rule", &rule.param)
    }
}

// ── ValidatorDef ──────────────────────────────────────────────────────────────

/// A reusable, named validator: rules, default messages and scenes.
///
/// Register it with [`App::validator`](crate::App::validator) and refer to it
/// from a controller as `"User"` or `"User.edit"` (scene `edit`).
#[derive(Clone, Debug, Default)]
pub struct ValidatorDef {
    rules: Vec<(String, String)>,
    messages: Messages,
    scenes: HashMap<String, Vec<String>>,
}

impl ValidatorDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, key: impl Into<String>, rule_str: impl Into<String>) -> Self {
        self.rules.push((key.into(), rule_str.into()));
        self
    }

    pub fn message(mut self, key: impl Into<String>, msg: impl Into<String>) -> Self {
        self.messages.insert(key.into(), msg.into());
        self
    }

    /// Restricts scene `name` to the listed fields.
    pub fn scene<I, S>(mut self, name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scenes.insert(name.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    /// Builds a fresh [`Validate`]. `overrides` win over the definition's own
    /// messages.
    pub fn make(&self, overrides: &Messages) -> Validate {
        let mut messages = self.messages.clone();
        messages.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut v = Validate::new(self.rules.iter().map(|(k, r)| (k, r)), messages);
        v.scenes = self.scenes.clone();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn user() -> ValidatorDef {
        ValidatorDef::new()
            .rule("name|Name", "require|max:10")
            .rule("email", "require|email")
            .rule("age", "number|between:1,120")
            .message("email.email", "bad email")
            .scene("edit", ["name", "age"])
    }

    #[test]
    fn stops_at_first_failure() {
        let mut v = user().make(&Messages::new());
        assert!(!v.check(&obj(json!({"email": "x"}))));
        assert_eq!(v.error(), Some(&ValidationErrors::Single("Name is required".into())));
    }

    #[test]
    fn batch_collects_one_message_per_field() {
        let mut v = user().make(&Messages::new());
        v.batch(true);
        assert!(!v.check(&obj(json!({"email": "x", "age": "200"}))));
        let err = v.error().unwrap();
        assert_eq!(err.field("name"), Some("Name is required"));
        assert_eq!(err.field("email"), Some("bad email"));
        assert_eq!(err.field("age"), Some("age must be between 1 and 120"));
    }

    #[test]
    fn optional_fields_are_skipped_when_absent() {
        let mut v = user().make(&Messages::new());
        assert!(v.check(&obj(json!({"name": "ann", "email": "ann@example.com"}))));
        assert!(v.error().is_none());
    }

    #[test]
    fn scene_limits_checked_fields() {
        let mut v = user().make(&Messages::new());
        v.scene("edit");
        assert!(v.check(&obj(json!({"name": "ann"}))));
    }

    #[test]
    fn undefined_scene_checks_everything() {
        let mut v = user().make(&Messages::new());
        v.scene("nope");
        assert!(!v.check(&obj(json!({"name": "ann"}))));
    }

    #[test]
    fn override_messages_win() {
        let overrides = Messages::from([("name.require".to_owned(), "who are you?".to_owned())]);
        let mut v = user().make(&overrides);
        assert!(!v.check(&obj(json!({}))));
        assert_eq!(v.error().unwrap().first(), "who are you?");
    }

    #[test]
    fn placeholders_in_messages() {
        let mut v = Validate::new([("qty|Quantity", "in:1,2,3")], [("qty", ":attribute not in :rule (:1..:3)")]);
        assert!(!v.check(&obj(json!({"qty": 9}))));
        assert_eq!(v.error().unwrap().first(), "Quantity not in 1,2,3 (1..3)");
    }

    #[test]
    fn batch_serialises_as_object() {
        let mut v = Validate::new([("a", "require"), ("b", "require")], Messages::new());
        v.batch(true);
        v.check(&Map::new());
        let json = serde_json::to_value(v.error().unwrap()).unwrap();
        assert_eq!(json, json!({"a": "a is required", "b": "b is required"}));
    }
}
