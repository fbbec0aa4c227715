//! Flash-style responses: `success`, `error`, `result`, `redirect`.
//!
//! `success` and `error` answer AJAX clients with JSON. Browsers get the
//! `[jump]` template when one is configured, JSON otherwise.

use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use tracing::warn;
use url::{Position, Url};

use super::Base;
use crate::error::Error;
use crate::response::Response;

const BACK: &str = "javascript:history.back(-1);";

/// Base for encoding relative urls; only the path part is kept.
const LOCAL_ORIGIN: &str = "http://localhost/";

impl Base {
    /// Reports success. An empty `url` points back at the referer.
    pub async fn success(&self, msg: &str, url: &str, data: Value) -> Result<Response, Error> {
        let url = if url.is_empty() {
            self.request().header("referer").unwrap_or_default().to_owned()
        } else {
            self.build_url(url)
        };
        let template = self.app().config().jump.success_tmpl.clone();
        self.dispatch_jump(1, msg, url, data, template).await
    }

    /// Reports failure. An empty `url` sends the browser back one page.
    pub async fn error(&self, msg: &str, url: &str, data: Value) -> Result<Response, Error> {
        let url = if url.is_empty() { BACK.to_owned() } else { self.build_url(url) };
        let template = self.app().config().jump.error_tmpl.clone();
        self.dispatch_jump(0, msg, url, data, template).await
    }

    /// An API envelope: `{code, msg, time, data}`.
    pub fn result(&self, data: Value, code: i64, msg: &str) -> Response {
        let body = json!({
            "code": code,
            "msg": msg,
            "time": OffsetDateTime::now_utc().unix_timestamp(),
            "data": data,
        });
        Response::json(body.to_string().into_bytes())
    }

    /// `302` to `url`, expanded like the `success`/`error` urls.
    pub fn redirect(&self, url: &str) -> Response {
        Response::redirect(&self.build_url(url))
    }

    /// Absolute paths, schemes and `javascript:` pass through; a bare
    /// `controller/action` becomes `/controller/action`. Non-ASCII urls are
    /// percent-encoded so they survive as a `location` header.
    fn build_url(&self, url: &str) -> String {
        if url.starts_with("javascript:") {
            return url.to_owned();
        }
        let expanded = if url.starts_with('/') || url.contains("://") {
            url.to_owned()
        } else {
            format!("/{url}")
        };
        if expanded.is_ascii() {
            return expanded;
        }

        let encoded = if expanded.contains("://") {
            Url::parse(&expanded).map(String::from)
        } else {
            Url::parse(LOCAL_ORIGIN)
                .and_then(|origin| origin.join(&expanded))
                .map(|joined| joined[Position::BeforePath..].to_owned())
        };
        encoded.unwrap_or_else(|e| {
            warn!(url = %expanded, "cannot encode url: {e}");
            expanded
        })
    }

    async fn dispatch_jump(
        &self,
        code: i64,
        msg: &str,
        url: String,
        data: Value,
        template: Option<String>,
    ) -> Result<Response, Error> {
        let mut payload = Map::new();
        payload.insert("code".to_owned(), code.into());
        payload.insert("msg".to_owned(), msg.into());
        payload.insert("data".to_owned(), data);
        payload.insert("url".to_owned(), url.into());
        payload.insert("wait".to_owned(), self.app().config().jump.wait.into());

        // The controller's own view: its vars, filters and engine apply.
        match template {
            Some(template) if !self.request().is_ajax() => {
                Ok(Response::html(self.view().fetch_with(&template, &payload).await?))
            }
            _ => Ok(Response::json(Value::Object(payload).to_string().into_bytes())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::app::App;
    use crate::config::AppConfig;
    use crate::request::tests::request;

    fn base_with(config: AppConfig, headers: &[(&str, &str)]) -> Base {
        Base::new(Arc::new(App::new(config)), request("/", headers, "", "user", "save")).unwrap()
    }

    fn body_json(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[tokio::test]
    async fn success_without_template_is_json() {
        let b = base_with(AppConfig::default(), &[("referer", "/users")]);
        let res = b.success("saved", "", json!({"id": 7})).await.unwrap();
        assert_eq!(
            body_json(&res),
            json!({"code": 1, "msg": "saved", "data": {"id": 7}, "url": "/users", "wait": 3})
        );
    }

    #[tokio::test]
    async fn error_defaults_to_history_back() {
        let b = base_with(AppConfig::default(), &[]);
        let res = b.error("nope", "", Value::Null).await.unwrap();
        let body = body_json(&res);
        assert_eq!(body["code"], 0);
        assert_eq!(body["url"], BACK);
    }

    #[tokio::test]
    async fn browsers_get_the_jump_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("public")).unwrap();
        std::fs::write(dir.path().join("public/success.html"), "{$msg} -> {$url}").unwrap();

        let mut config = AppConfig::default();
        config.view.view_path = dir.path().to_path_buf();
        config.jump.success_tmpl = Some("public/success".to_owned());

        let browser = base_with(config.clone(), &[("accept", "text/html")]);
        let res = browser.success("done", "user/index", Value::Null).await.unwrap();
        assert_eq!(&res.body()[..], b"done -> /user/index");

        let xhr = base_with(config, &[("x-requested-with", "XMLHttpRequest")]);
        let res = xhr.success("done", "user/index", Value::Null).await.unwrap();
        assert_eq!(body_json(&res)["url"], "/user/index");
    }

    #[test]
    fn result_envelope() {
        let b = base_with(AppConfig::default(), &[]);
        let body = body_json(&b.result(json!([1, 2]), 200, "ok"));
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"], json!([1, 2]));
        assert!(body["time"].as_i64().unwrap() > 0);
    }

    #[test]
    fn redirect_expands_bare_routes() {
        let b = base_with(AppConfig::default(), &[]);
        assert_eq!(b.redirect("user/login").header("location"), Some("/user/login"));
        assert_eq!(b.redirect("https://example.com").header("location"), Some("https://example.com"));
    }

    #[test]
    fn redirect_percent_encodes_non_ascii_targets() {
        let b = base_with(AppConfig::default(), &[]);
        let res = b.redirect("用户/登录");
        assert_eq!(res.status_code(), http::StatusCode::FOUND);
        assert_eq!(res.header("location"), Some("/%E7%94%A8%E6%88%B7/%E7%99%BB%E5%BD%95"));

        let res = b.redirect("/搜索?q=键");
        assert_eq!(res.header("location"), Some("/%E6%90%9C%E7%B4%A2?q=%E9%94%AE"));
    }

    #[tokio::test]
    async fn jump_page_keeps_controller_view_state() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("public")).unwrap();
        std::fs::write(dir.path().join("public/success.html"), "[{$site}] {$msg}").unwrap();

        let mut config = AppConfig::default();
        config.view.view_path = dir.path().to_path_buf();
        config.jump.success_tmpl = Some("public/success".to_owned());

        let mut b = base_with(config, &[]);
        b.assign(json!({"site": "demo"})).filter(|s| s.to_uppercase());

        let res = b.success("done", "/x", Value::Null).await.unwrap();
        assert_eq!(&res.body()[..], b"[DEMO] DONE");
    }
}
