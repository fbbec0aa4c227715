//! Minimal keel example: a `User` controller with scoped middleware,
//! a named validator and jump responses.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' -H 'x-token: secret' \
//!        -d '{"name":"alice","email":"alice@example.com"}'
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' -H 'x-token: secret' \
//!        -d '{"name":"a b"}'

use async_trait::async_trait;
use http::{Method, StatusCode};
use keel::{
    App, AppConfig, Base, Controller, Error, Middleware, MiddlewareEntry, Request, Response,
    Router, Server, Validation, ValidatorDef,
};
use serde_json::json;
use tracing::info;

/// Logs every request the controller sees.
struct Access;

#[async_trait]
impl Middleware for Access {
    async fn before(&self, req: &mut Request) -> Result<(), Response> {
        info!(method = %req.method(), path = req.path(), "access");
        Ok(())
    }
}

/// Write actions need `x-token: secret`.
struct Token;

#[async_trait]
impl Middleware for Token {
    async fn before(&self, req: &mut Request) -> Result<(), Response> {
        if req.header("x-token") == Some("secret") {
            Ok(())
        } else {
            Err(Response::status(StatusCode::UNAUTHORIZED))
        }
    }
}

struct User {
    base: Base,
}

impl Controller for User {
    const NAME: &'static str = "user";

    fn middleware() -> Vec<MiddlewareEntry> {
        vec![
            MiddlewareEntry::from("access"),
            MiddlewareEntry::scoped("token").except(["read"]),
        ]
    }

    fn construct(base: Base) -> Self {
        Self { base }
    }

    fn base(&self) -> &Base { &self.base }
    fn base_mut(&mut self) -> &mut Base { &mut self.base }
}

impl User {
    // GET /users/{id}
    async fn read(self) -> Response {
        let id = self.base.request().param("id").unwrap_or("unknown");
        self.base.result(json!({"id": id, "name": "alice"}), 1, "ok")
    }

    // POST /users
    async fn save(self) -> Result<Response, Error> {
        let input = self.base.request().input();
        if let Validation::Failed(errors) = self.base.validate(&input, "User.create")? {
            return self.base.error(errors.first(), "", json!(null)).await;
        }
        self.base.success("user saved", "users", json!(input)).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    keel::logging::init();

    let config = match std::env::var("KEEL_CONFIG") {
        Ok(path) => AppConfig::load(path).await?,
        Err(_) => AppConfig::default(),
    };

    let server = Server::from_config(&config);
    let app = App::new(config)
        .middleware("access", Access)
        .middleware("token", Token)
        .validator(
            "user",
            ValidatorDef::new()
                .rule("name|Name", "require|alphaDash|max:25")
                .rule("email|Email", "require|email")
                .message("name.require", "Tell us your name")
                .scene("create", ["name", "email"]),
        );

    let router = Router::new()
        .on(Method::GET, "/users/{id}", "read", User::read)
        .on(Method::POST, "/users", "save", User::save);

    server.serve(app, router).await
}
