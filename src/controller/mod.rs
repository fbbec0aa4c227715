//! Controllers.
//!
//! A controller is a plain struct that embeds a [`Base`] and implements
//! [`Controller`]. A new instance is constructed for every request:
//!
//! ```rust
//! use keel::{Base, Controller, Error, MiddlewareEntry};
//! use serde_json::json;
//!
//! struct User {
//!     base: Base,
//! }
//!
//! impl Controller for User {
//!     const NAME: &'static str = "user";
//!
//!     fn middleware() -> Vec<MiddlewareEntry> {
//!         vec![MiddlewareEntry::scoped("auth").except(["login"])]
//!     }
//!
//!     fn construct(mut base: Base) -> Self {
//!         base.assign(json!({ "site": "example" }));
//!         Self { base }
//!     }
//!
//!     fn base(&self) -> &Base { &self.base }
//!     fn base_mut(&mut self) -> &mut Base { &mut self.base }
//! }
//!
//! impl User {
//!     async fn read(mut self) -> Result<String, Error> {
//!         let id = self.base.request().param("id").unwrap_or_default().to_owned();
//!         self.base.assign(json!({ "id": id }));
//!         self.base.fetch("").await          // renders view/user/read.html
//!     }
//! }
//! ```

mod jump;

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::app::App;
use crate::error::Error;
use crate::middleware::{MiddlewareEntry, Pipeline};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::validate::{Messages, Validate, ValidationErrors};
use crate::view::{EngineOptions, View, resolve_template};

// ── Controller trait ──────────────────────────────────────────────────────────

/// Implemented by every application controller.
pub trait Controller: Send + Sized + 'static {
    /// Controller name. Used to resolve templates (`<NAME>/<action>`).
    const NAME: &'static str;

    /// Middleware declared by this controller, in application order.
    fn middleware() -> Vec<MiddlewareEntry> {
        Vec::new()
    }

    /// Builds the controller around its per-request [`Base`].
    ///
    /// This is the initialisation hook: it runs before middleware is
    /// registered, so it may still edit `base.middleware_mut()`.
    fn construct(base: Base) -> Self;

    fn base(&self) -> &Base;
    fn base_mut(&mut self) -> &mut Base;
}

// ── Validation outcome ────────────────────────────────────────────────────────

/// What [`Base::validate`] returns when it does not fail hard.
#[derive(Clone, Debug, PartialEq)]
pub enum Validation {
    Passed,
    Failed(ValidationErrors),
}

impl Validation {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Passed => None,
            Self::Failed(errors) => Some(errors),
        }
    }
}

/// What to validate against: inline rules, or a registered validator name
/// with an optional scene (`"User.edit"`).
#[derive(Clone, Debug, PartialEq)]
pub enum ValidateTarget {
    Rules(Vec<(String, String)>),
    Named(String),
}

impl From<&str> for ValidateTarget {
    fn from(name: &str) -> Self { Self::Named(name.to_owned()) }
}

impl From<String> for ValidateTarget {
    fn from(name: String) -> Self { Self::Named(name) }
}

impl From<Vec<(String, String)>> for ValidateTarget {
    fn from(rules: Vec<(String, String)>) -> Self { Self::Rules(rules) }
}

impl From<Vec<(&str, &str)>> for ValidateTarget {
    fn from(rules: Vec<(&str, &str)>) -> Self {
        Self::Rules(rules.into_iter().map(|(k, r)| (k.to_owned(), r.to_owned())).collect())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for ValidateTarget {
    fn from(rules: [(&str, &str); N]) -> Self {
        Self::from(Vec::from(rules))
    }
}

/// `"User.edit"` → (`User`, `Some("edit")`). A leading dot does not split,
/// segments past the second are ignored, an empty scene is no scene.
fn split_scene(name: &str) -> (&str, Option<&str>) {
    match name.find('.') {
        Some(pos) if pos > 0 => {
            let scene = name[pos + 1..].split('.').next().filter(|s| !s.is_empty());
            (&name[..pos], scene)
        }
        _ => (name, None),
    }
}

// ── Base ──────────────────────────────────────────────────────────────────────

/// Per-request controller state: the app, the request, a view, the
/// validation flags and the middleware list.
pub struct Base {
    app: Arc<App>,
    request: Request,
    view: View,
    fail_exception: bool,
    batch_validate: bool,
    middleware: Vec<MiddlewareEntry>,
}

impl Base {
    /// Wires a base to `app` for `request`. The view comes from the app;
    /// the validation flags start from `[controller]` in the app config.
    pub fn new(app: Arc<App>, request: Request) -> Result<Self, Error> {
        let view = app.view()?;
        let defaults = &app.config().controller;
        let (fail_exception, batch_validate) = (defaults.fail_exception, defaults.batch_validate);
        Ok(Self { app, request, view, fail_exception, batch_validate, middleware: Vec::new() })
    }

    pub fn app(&self) -> &App { &self.app }
    pub fn request(&self) -> &Request { &self.request }
    pub fn request_mut(&mut self) -> &mut Request { &mut self.request }
    pub fn view(&self) -> &View { &self.view }
    pub fn view_mut(&mut self) -> &mut View { &mut self.view }

    pub fn middleware(&self) -> &[MiddlewareEntry] { &self.middleware }
    pub fn middleware_mut(&mut self) -> &mut Vec<MiddlewareEntry> { &mut self.middleware }

    /// Names of the declared middleware that apply to the current action,
    /// in declaration order.
    pub fn applicable_middleware(&self) -> Vec<&str> {
        let action = self.request.action();
        self.middleware
            .iter()
            .filter(|entry| entry.applies_to(action))
            .map(MiddlewareEntry::name)
            .collect()
    }

    /// Resolves the applicable middleware against the app registry.
    pub(crate) fn register_middleware(&self) -> Result<Pipeline, Error> {
        let registry = self.app.middleware_registry();
        let mut pipeline = Pipeline::default();
        for name in self.applicable_middleware() {
            pipeline.push(name.to_owned(), registry.controller(name)?);
        }
        Ok(pipeline)
    }

    // ── View delegation ───────────────────────────────────────────────────────

    /// Renders a template. `""` is `<controller>/<action>`, a bare name is
    /// looked up in the controller's directory.
    pub async fn fetch(&self, template: &str) -> Result<String, Error> {
        let name = resolve_template(template, self.request.controller(), self.request.action());
        self.view.fetch(&name).await
    }

    /// Renders inline template content.
    pub fn display(&self, content: &str) -> Result<String, Error> {
        self.view.display(content)
    }

    pub fn assign(&mut self, vars: impl Serialize) -> &mut Self {
        self.view.assign(vars);
        self
    }

    pub fn assign_one(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.view.assign_one(name, value);
        self
    }

    pub fn filter(&mut self, f: impl Fn(String) -> String + Send + Sync + 'static) -> &mut Self {
        self.view.filter(f);
        self
    }

    pub fn engine(&mut self, options: impl Into<EngineOptions>) -> Result<&mut Self, Error> {
        self.view.engine(options)?;
        Ok(self)
    }

    // ── Validation ────────────────────────────────────────────────────────────

    /// Whether a failed [`validate`](Self::validate) returns
    /// `Err(Error::Validation)` instead of `Ok(Validation::Failed)`.
    pub fn validate_fail_exception(&mut self, fail: bool) -> &mut Self {
        self.fail_exception = fail;
        self
    }

    pub fn batch_validate(&mut self, batch: bool) -> &mut Self {
        self.batch_validate = batch;
        self
    }

    /// Validates `data` with default messages and no per-call batch flag.
    pub fn validate(
        &self,
        data: &Map<String, Value>,
        target: impl Into<ValidateTarget>,
    ) -> Result<Validation, Error> {
        self.validate_with(data, target, &Messages::new(), false)
    }

    pub fn validate_with(
        &self,
        data: &Map<String, Value>,
        target: impl Into<ValidateTarget>,
        messages: &Messages,
        batch: bool,
    ) -> Result<Validation, Error> {
        let mut v = match target.into() {
            ValidateTarget::Rules(rules) => Validate::new(rules, messages.clone()),
            ValidateTarget::Named(name) => {
                let (validator, scene) = split_scene(&name);
                let mut v = self.app.make_validator(validator, messages)?;
                if let Some(scene) = scene {
                    v.scene(scene);
                }
                v
            }
        };

        if batch || self.batch_validate {
            v.batch(true);
        }

        if v.check(data) {
            return Ok(Validation::Passed);
        }

        let errors = v
            .into_error()
            .unwrap_or_else(|| ValidationErrors::Single(String::new()));
        debug!(
            controller = self.request.controller(),
            action = self.request.action(),
            errors = %errors,
            "validation failed"
        );
        if self.fail_exception {
            Err(Error::Validation(errors))
        } else {
            Ok(Validation::Failed(errors))
        }
    }
}

// ── Per-request lifecycle ─────────────────────────────────────────────────────

/// Constructs `C` for `req`, registers its middleware and runs `action`
/// inside the middleware pipeline.
pub(crate) async fn run<C, F, Fut, R>(app: Arc<App>, req: Request, action: &F) -> Response
where
    C: Controller,
    F: Fn(C) -> Fut,
    Fut: Future<Output = R>,
    R: IntoResponse,
{
    let mut base = match Base::new(app, req) {
        Ok(base) => base,
        Err(e) => return e.into_response(),
    };
    base.middleware = C::middleware();

    let mut controller = C::construct(base);
    let pipeline = match controller.base().register_middleware() {
        Ok(pipeline) => pipeline,
        Err(e) => return e.into_response(),
    };

    debug!(
        controller = C::NAME,
        action = controller.base().request().action(),
        middleware = ?pipeline.names(),
        "dispatching"
    );

    if let Err((ran, res)) = pipeline.before(controller.base_mut().request_mut()).await {
        return pipeline.after(ran, res).await;
    }

    let res = action(controller).await.into_response();
    let res = pipeline.after(pipeline.len(), res).await;
    info!(controller = C::NAME, status = %res.status_code(), "action completed");
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::request::tests::request;
    use crate::validate::ValidatorDef;
    use crate::view::EngineConfig;
    use serde_json::json;

    fn app() -> Arc<App> {
        Arc::new(
            App::new(AppConfig::default()).validator(
                "user",
                ValidatorDef::new()
                    .rule("name|Name", "require|max:5")
                    .rule("email|Email", "require|email")
                    .scene("edit", ["name"]),
            ),
        )
    }

    fn base(action: &str) -> Base {
        Base::new(app(), request("/", &[], "", "user", action)).unwrap()
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn scene_splitting() {
        assert_eq!(split_scene("User"), ("User", None));
        assert_eq!(split_scene("User.edit"), ("User", Some("edit")));
        assert_eq!(split_scene("User.edit.extra"), ("User", Some("edit")));
        assert_eq!(split_scene("User."), ("User", None));
        assert_eq!(split_scene(".edit"), (".edit", None));
    }

    #[test]
    fn applicable_middleware_follows_only_and_except() {
        let mut b = base("index");
        *b.middleware_mut() = vec![
            MiddlewareEntry::from("log"),
            MiddlewareEntry::scoped("auth").except(["index"]),
            MiddlewareEntry::scoped("admin").only(["index", "delete"]),
            MiddlewareEntry::scoped("audit").only(["delete"]),
        ];
        assert_eq!(b.applicable_middleware(), vec!["log", "admin"]);
    }

    #[test]
    fn unknown_applicable_middleware_is_an_error() {
        let mut b = base("index");
        *b.middleware_mut() = vec![MiddlewareEntry::from("ghost")];
        assert!(matches!(b.register_middleware(), Err(Error::UnknownMiddleware(_))));
    }

    #[test]
    fn skipped_unknown_middleware_is_not_resolved() {
        let mut b = base("index");
        *b.middleware_mut() = vec![MiddlewareEntry::scoped("ghost").only(["delete"])];
        assert_eq!(b.register_middleware().unwrap().len(), 0);
    }

    #[test]
    fn validate_returns_errors_by_default() {
        let b = base("save");
        let outcome = b.validate(&obj(json!({"name": "toolong"})), "User").unwrap();
        assert_eq!(
            outcome,
            Validation::Failed(ValidationErrors::Single("Name length must not exceed 5".into()))
        );
    }

    #[test]
    fn validate_fails_hard_when_asked() {
        let mut b = base("save");
        b.validate_fail_exception(true);
        let err = b.validate(&obj(json!({})), "User").unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationErrors::Single(m)) if m == "Name is required"));
    }

    #[test]
    fn validate_with_scene() {
        let b = base("update");
        assert!(b.validate(&obj(json!({"name": "ann"})), "User.edit").unwrap().is_passed());
        assert!(!b.validate(&obj(json!({"name": "ann"})), "User").unwrap().is_passed());
    }

    #[test]
    fn validate_inline_rules_with_messages_and_batch() {
        let b = base("save");
        let messages = Messages::from([("age.number".to_owned(), "age must be digits".to_owned())]);
        let outcome = b
            .validate_with(
                &obj(json!({"age": "x"})),
                [("title", "require"), ("age", "number")],
                &messages,
                true,
            )
            .unwrap();
        let errors = outcome.errors().unwrap();
        assert_eq!(errors.field("title"), Some("title is required"));
        assert_eq!(errors.field("age"), Some("age must be digits"));
    }

    #[test]
    fn batch_flag_on_base_enables_batch() {
        let mut b = base("save");
        b.batch_validate(true);
        let outcome = b.validate(&obj(json!({})), "user").unwrap();
        assert!(matches!(outcome, Validation::Failed(ValidationErrors::Batch(ref m)) if m.len() == 2));
    }

    #[test]
    fn unknown_validator() {
        let b = base("save");
        assert!(matches!(b.validate(&Map::new(), "Order.edit"), Err(Error::UnknownValidator(n)) if n == "Order"));
    }

    #[test]
    fn flags_default_from_config() {
        let mut config = AppConfig::default();
        config.controller.fail_exception = true;
        let b = Base::new(Arc::new(App::new(config)), request("/", &[], "", "user", "x")).unwrap();
        assert!(matches!(b.validate(&Map::new(), [("a", "require")]), Err(Error::Validation(_))));
    }

    #[test]
    fn view_delegation() {
        let mut b = base("read");
        b.assign(json!({"name": "ann"}))
            .assign_one("n", 2)
            .filter(|s| s.trim().to_owned());
        assert_eq!(b.display("  {$name}:{$n}  ").unwrap(), "ann:2");
        assert!(matches!(b.engine("missing"), Err(Error::UnknownEngine(_))));
    }

    #[test]
    fn engine_switch_with_full_config() {
        let mut b = base("read");
        b.assign_one("name", "<ann>");
        let config = EngineConfig {
            tpl_begin: "[[".to_owned(),
            tpl_end: "]]".to_owned(),
            escape: false,
            ..EngineConfig::default()
        };
        b.engine(config).unwrap();
        assert_eq!(b.view().config().tpl_begin, "[[");
        assert_eq!(b.display("{$name} [[$name]]").unwrap(), "{$name} <ann>");
    }
}
