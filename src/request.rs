//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde_json::{Map, Value};
use tracing::debug;

/// An incoming HTTP request, already routed to a controller action.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) controller: &'static str,
    pub(crate) action: String,
}

impl Request {
    pub(crate) fn new(
        parts: http::request::Parts,
        body: Bytes,
        params: HashMap<String, String>,
        controller: &'static str,
        action: &str,
    ) -> Self {
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body,
            params,
            controller,
            action: action.to_ascii_lowercase(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Name of the controller serving this request.
    pub fn controller(&self) -> &str { self.controller }

    /// Name of the action serving this request, lowercased.
    pub fn action(&self) -> &str { &self.action }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns a decoded query-string value.
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// `X-Requested-With: XMLHttpRequest`. The `Accept` header plays no part.
    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
    }

    /// All request input as one map, ready for validation.
    ///
    /// Later sources override earlier ones: route params, then the query
    /// string, then the body (JSON object or `application/x-www-form-urlencoded`).
    pub fn input(&self) -> Map<String, Value> {
        let mut input = Map::new();

        for (k, v) in &self.params {
            input.insert(k.clone(), Value::String(v.clone()));
        }
        if let Some(query) = &self.query {
            for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
                input.insert(k.into_owned(), Value::String(v.into_owned()));
            }
        }

        if self.body.is_empty() {
            return input;
        }
        let content_type = self.header("content-type").unwrap_or_default();
        if content_type.starts_with("application/json") {
            match serde_json::from_slice::<Value>(&self.body) {
                Ok(Value::Object(body)) => input.extend(body),
                Ok(_) => debug!(path = %self.path, "json body is not an object, ignored"),
                Err(e) => debug!(path = %self.path, "unparseable json body: {e}"),
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            for (k, v) in url::form_urlencoded::parse(&self.body) {
                input.insert(k.into_owned(), Value::String(v.into_owned()));
            }
        }

        input
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Builds a routed request without going through the router.
    pub(crate) fn request(
        uri: &str,
        headers: &[(&str, &str)],
        body: &str,
        controller: &'static str,
        action: &str,
    ) -> Request {
        let mut builder = http::Request::builder().method(Method::POST).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        Request::new(parts, Bytes::from(body.to_owned()), HashMap::new(), controller, action)
    }

    #[test]
    fn action_is_lowercased() {
        let req = request("/", &[], "", "user", "ShowAll");
        assert_eq!(req.action(), "showall");
        assert_eq!(req.controller(), "user");
    }

    #[test]
    fn input_merges_query_and_json_body() {
        let req = request(
            "/users?name=query&page=2",
            &[("content-type", "application/json")],
            r#"{"name":"body","age":30}"#,
            "user",
            "save",
        );
        let input = req.input();
        assert_eq!(input.get("name"), Some(&json!("body")));
        assert_eq!(input.get("page"), Some(&json!("2")));
        assert_eq!(input.get("age"), Some(&json!(30)));
    }

    #[test]
    fn input_decodes_forms() {
        let req = request(
            "/users",
            &[("content-type", "application/x-www-form-urlencoded")],
            "name=ann+lee&email=a%40b.io",
            "user",
            "save",
        );
        let input = req.input();
        assert_eq!(input.get("name"), Some(&json!("ann lee")));
        assert_eq!(input.get("email"), Some(&json!("a@b.io")));
    }

    #[test]
    fn ajax_detection() {
        let xhr = request("/", &[("X-Requested-With", "XMLHttpRequest")], "", "c", "a");
        let plain = request("/", &[("accept", "text/html")], "", "c", "a");
        let json_client = request("/", &[("accept", "application/json")], "", "c", "a");
        assert!(xhr.is_ajax());
        assert!(!plain.is_ajax());
        assert!(!json_client.is_ajax());
    }
}
