//! Template rendering.
//!
//! A [`View`] is created per request by the [`App`](crate::App). It owns the
//! variables assigned by the controller, the output filters, and the current
//! [`TemplateEngine`]. Engines are built from an [`EngineConfig`] by factories
//! held in an [`EngineRegistry`]; `placeholder` is always registered.

mod placeholder;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Error;

pub use placeholder::PlaceholderEngine;

// ── Engine plumbing ───────────────────────────────────────────────────────────

/// Renders named templates and inline content against assigned variables.
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    /// Renders the template called `template` (e.g. `user/read`).
    async fn fetch(&self, template: &str, vars: &Map<String, Value>) -> Result<String, Error>;

    /// Renders `content` as an inline template.
    fn display(&self, content: &str, vars: &Map<String, Value>) -> Result<String, Error>;
}

/// Engine settings, the `[view]` table of the app config.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Registry name of the engine.
    #[serde(rename = "type")]
    pub kind: String,
    pub view_path: PathBuf,
    pub view_suffix: String,
    pub tpl_begin: String,
    pub tpl_end: String,
    /// HTML-escape substituted values.
    pub escape: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: "placeholder".to_owned(),
            view_path: PathBuf::from("view"),
            view_suffix: "html".to_owned(),
            tpl_begin: "{".to_owned(),
            tpl_end: "}".to_owned(),
            escape: true,
        }
    }
}

/// Which engine to switch to: a registry name (keeping the current settings)
/// or a complete configuration.
#[derive(Clone, Debug)]
pub enum EngineOptions {
    Named(String),
    Config(EngineConfig),
}

impl From<&str> for EngineOptions {
    fn from(name: &str) -> Self { Self::Named(name.to_owned()) }
}

impl From<String> for EngineOptions {
    fn from(name: String) -> Self { Self::Named(name) }
}

impl From<EngineConfig> for EngineOptions {
    fn from(config: EngineConfig) -> Self { Self::Config(config) }
}

/// Builds an engine from its configuration.
pub type EngineFactory = Arc<dyn Fn(&EngineConfig) -> Box<dyn TemplateEngine> + Send + Sync>;

/// Engine factories by name.
#[derive(Clone)]
pub struct EngineRegistry {
    factories: HashMap<String, EngineFactory>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        let mut registry = Self { factories: HashMap::new() };
        registry.register("placeholder", Arc::new(|c: &EngineConfig| {
            Box::new(PlaceholderEngine::new(c)) as Box<dyn TemplateEngine>
        }));
        registry
    }

    pub fn register(&mut self, kind: &str, factory: EngineFactory) {
        self.factories.insert(kind.to_owned(), factory);
    }

    pub fn build(&self, config: &EngineConfig) -> Result<Box<dyn TemplateEngine>, Error> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| Error::UnknownEngine(config.kind.clone()))?;
        Ok(factory(config))
    }
}

impl Default for EngineRegistry {
    fn default() -> Self { Self::new() }
}

// ── View ──────────────────────────────────────────────────────────────────────

type Filter = Box<dyn Fn(String) -> String + Send + Sync>;

/// Per-request view state.
pub struct View {
    engine: Box<dyn TemplateEngine>,
    config: EngineConfig,
    registry: Arc<EngineRegistry>,
    data: Map<String, Value>,
    filters: Vec<Filter>,
}

impl View {
    pub(crate) fn new(registry: Arc<EngineRegistry>, config: EngineConfig) -> Result<Self, Error> {
        let engine = registry.build(&config)?;
        Ok(Self { engine, config, registry, data: Map::new(), filters: Vec::new() })
    }

    /// Merges the fields of `vars` (anything serialising to an object) into
    /// the template variables. Other shapes are ignored with a warning.
    pub fn assign(&mut self, vars: impl Serialize) -> &mut Self {
        match serde_json::to_value(vars) {
            Ok(Value::Object(map)) => self.data.extend(map),
            Ok(other) => warn!(kind = %kind_of(&other), "assign expects an object, ignored"),
            Err(e) => warn!("assign: unserialisable value: {e}"),
        }
        self
    }

    pub fn assign_one(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.data.insert(name.to_owned(), value.into());
        self
    }

    /// Adds an output filter. Filters run in registration order on the
    /// rendered output of [`fetch`](Self::fetch) and [`display`](Self::display).
    pub fn filter(&mut self, f: impl Fn(String) -> String + Send + Sync + 'static) -> &mut Self {
        self.filters.push(Box::new(f));
        self
    }

    /// Switches the template engine.
    pub fn engine(&mut self, options: impl Into<EngineOptions>) -> Result<&mut Self, Error> {
        let config = match options.into() {
            EngineOptions::Named(kind) => EngineConfig { kind, ..self.config.clone() },
            EngineOptions::Config(config) => config,
        };
        self.engine = self.registry.build(&config)?;
        debug!(engine = %config.kind, "view engine switched");
        self.config = config;
        Ok(self)
    }

    pub async fn fetch(&self, template: &str) -> Result<String, Error> {
        let out = self.engine.fetch(template, &self.data).await?;
        Ok(self.apply_filters(out))
    }

    /// Like [`fetch`](Self::fetch), with `extra` layered over the assigned
    /// variables for this render only.
    pub async fn fetch_with(&self, template: &str, extra: &Map<String, Value>) -> Result<String, Error> {
        let mut vars = self.data.clone();
        vars.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        let out = self.engine.fetch(template, &vars).await?;
        Ok(self.apply_filters(out))
    }

    pub fn display(&self, content: &str) -> Result<String, Error> {
        let out = self.engine.display(content, &self.data)?;
        Ok(self.apply_filters(out))
    }

    pub fn vars(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn apply_filters(&self, out: String) -> String {
        self.filters.iter().fold(out, |acc, f| f(acc))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Maps the template argument of a controller `fetch` to a template name:
/// empty → `controller/action`, bare name → `controller/name`, else verbatim.
pub(crate) fn resolve_template(template: &str, controller: &str, action: &str) -> String {
    if template.is_empty() {
        format!("{controller}/{action}")
    } else if !template.contains('/') {
        format!("{controller}/{template}")
    } else {
        template.to_owned()
    }
}
