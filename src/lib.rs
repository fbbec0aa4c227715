//! # keel
//!
//! A small MVC layer for Rust services behind a reverse proxy: routes point
//! at controller actions, and every request gets a freshly constructed
//! controller wired to the app, the request and a view.
//!
//! What a controller gets from its [`Base`]:
//!
//! - **Middleware scoping** — declare middleware by name, limit it with
//!   `only` / `except` action lists
//! - **View delegation** — `fetch`, `display`, `assign`, `filter`, `engine`
//! - **Validation** — inline rules or named validators with scenes
//!   (`"User.edit"`), returning the messages or failing hard
//! - **Jump responses** — `success`, `error`, `result`, `redirect`
//!
//! TLS, rate limiting and body-size limits stay with the proxy.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::Method;
//! use keel::{App, AppConfig, Base, Controller, Error, Router, Server, Validation};
//! use serde_json::json;
//!
//! struct User { base: Base }
//!
//! impl Controller for User {
//!     const NAME: &'static str = "user";
//!     fn construct(base: Base) -> Self { Self { base } }
//!     fn base(&self) -> &Base { &self.base }
//!     fn base_mut(&mut self) -> &mut Base { &mut self.base }
//! }
//!
//! impl User {
//!     async fn save(self) -> Result<keel::Response, Error> {
//!         let input = self.base.request().input();
//!         if let Validation::Failed(errors) = self.base.validate(&input, [("name", "require|max:25")])? {
//!             return self.base.error(errors.first(), "", json!(null)).await;
//!         }
//!         self.base.success("saved", "user/index", json!(input)).await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     keel::logging::init();
//!     let config = AppConfig::default();
//!     let server = Server::from_config(&config);
//!     let router = Router::new().on(Method::POST, "/users", "save", User::save);
//!     server.serve(App::new(config), router).await
//! }
//! ```

mod app;
mod config;
mod controller;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod logging;
pub mod middleware;
pub mod validate;
pub mod view;

pub use app::App;
pub use config::{AppConfig, ControllerConfig, JumpConfig, ServerConfig};
pub use controller::{Base, Controller, ValidateTarget, Validation};
pub use error::Error;
pub use handler::Action;
pub use middleware::{Middleware, MiddlewareEntry, MiddlewareRegistry};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use validate::{Messages, Validate, ValidationErrors, ValidatorDef};
pub use view::{EngineConfig, EngineOptions, EngineRegistry, TemplateEngine, View};
