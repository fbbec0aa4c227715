//! The application container.
//!
//! One [`App`] is built at startup and shared (behind an `Arc`) by every
//! request. It owns the configuration and the named collaborators controllers
//! reach for: middleware, validators and template engines.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::AppConfig;
use crate::error::Error;
use crate::middleware::{Middleware, MiddlewareRegistry};
use crate::validate::{Messages, Validate, ValidatorDef};
use crate::view::{EngineConfig, EngineRegistry, TemplateEngine, View};

pub struct App {
    config: AppConfig,
    middleware: MiddlewareRegistry,
    validators: HashMap<String, ValidatorDef>,
    engines: Arc<EngineRegistry>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            middleware: MiddlewareRegistry::new(),
            validators: HashMap::new(),
            engines: Arc::new(EngineRegistry::new()),
        }
    }

    /// Registers a middleware controllers can refer to by `name`.
    pub fn middleware(mut self, name: &str, middleware: impl Middleware) -> Self {
        self.middleware.register(name, middleware);
        self
    }

    /// Registers a named validator. `user_info` and `UserInfo` name the same one.
    pub fn validator(mut self, name: &str, def: ValidatorDef) -> Self {
        self.validators.insert(studly_case(name), def);
        self
    }

    /// Registers a template engine factory under `kind`.
    pub fn engine<F>(mut self, kind: &str, factory: F) -> Self
    where
        F: Fn(&EngineConfig) -> Box<dyn TemplateEngine> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.engines).register(kind, Arc::new(factory));
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn middleware_registry(&self) -> &MiddlewareRegistry {
        &self.middleware
    }

    /// A fresh view configured from `[view]`.
    pub fn view(&self) -> Result<View, Error> {
        View::new(Arc::clone(&self.engines), self.config.view.clone())
    }

    /// Builds the validator registered as `name`, with `messages` overriding
    /// its own.
    pub fn make_validator(&self, name: &str, messages: &Messages) -> Result<Validate, Error> {
        let key = studly_case(name);
        let def = self
            .validators
            .get(&key)
            .ok_or_else(|| Error::UnknownValidator(name.to_owned()))?;
        debug!(validator = %key, "validator resolved");
        Ok(def.make(messages))
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

/// `user_info` → `UserInfo`. Already-studly names pass through.
fn studly_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
