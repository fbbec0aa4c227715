//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Every route points at a
//! controller action; the controller itself is built per request.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use matchit::Router as MatchitRouter;
use tracing::{debug, warn};

use crate::app::App;
use crate::controller::Controller;
use crate::handler::{Action, BoxedAction};
use crate::request::Request;
use crate::response::Response;

struct Route {
    action: BoxedAction,
    name: String,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each [`Router::on`] call returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Routes `method` + `path` to the action called `action` on controller `C`.
    ///
    /// `action` is the name middleware `only`/`except` lists and template
    /// lookup see. Path parameters use `{name}` syntax:
    ///
    /// ```rust,ignore
    /// Router::new()
    ///     .on(Method::GET,    "/users/{id}", "read",   User::read)
    ///     .on(Method::POST,   "/users",      "save",   User::save)
    ///     .on(Method::DELETE, "/users/{id}", "delete", User::delete);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with an existing one.
    pub fn on<C, A>(mut self, method: Method, path: &str, action: &str, handler: A) -> Self
    where
        C: Controller,
        A: Action<C>,
    {
        let route = Route { action: handler.into_boxed_action(), name: action.to_owned() };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value, params))
    }

    /// Whether some other method has a route for `path`.
    fn path_known(&self, path: &str) -> bool {
        self.routes.values().any(|tree| tree.at(path).is_ok())
    }

    /// Routes one request and produces one response.
    ///
    /// Unknown paths answer `404`, known paths under another method `405`,
    /// unreadable bodies `400`.
    pub async fn handle<B>(&self, app: &Arc<App>, req: http::Request<B>) -> Response
    where
        B: Body<Data = Bytes>,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_owned();

        let Some((route, params)) = self.lookup(&parts.method, &path) else {
            let status = if self.path_known(&path) {
                StatusCode::METHOD_NOT_ALLOWED
            } else {
                StatusCode::NOT_FOUND
            };
            debug!(method = %parts.method, path = %path, status = %status, "no route");
            return Response::status(status);
        };

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(path = %path, "failed to read request body: {e}");
                return Response::status(StatusCode::BAD_REQUEST);
            }
        };

        let action = Arc::clone(&route.action);
        let req = Request::new(parts, body, params, action.controller(), &route.name);
        action.call(Arc::clone(app), req).await
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
