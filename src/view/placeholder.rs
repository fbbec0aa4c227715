//! The built-in `placeholder` engine.
//!
//! Templates are plain files with `{$name}` placeholders. Dotted paths reach
//! into nested values (`{$user.name}`), `{$body|raw}` skips HTML escaping.
//! Delimiters come from [`EngineConfig::tpl_begin`] / [`EngineConfig::tpl_end`].

use std::io::ErrorKind;
use std::path::{Component, Path};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::trace;

use super::{EngineConfig, TemplateEngine};
use crate::error::Error;

pub struct PlaceholderEngine {
    config: EngineConfig,
}

impl PlaceholderEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self { config: config.clone() }
    }

    fn render(&self, content: &str, vars: &Map<String, Value>) -> String {
        let open = format!("{}$", self.config.tpl_begin);
        let close = self.config.tpl_end.as_str();
        let mut out = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = rest.find(&open) {
            out.push_str(&rest[..start]);
            let after = &rest[start + open.len()..];
            let Some(end) = after.find(close) else {
                out.push_str(&rest[start..]);
                return out;
            };

            let expr = after[..end].trim();
            let (path, raw) = match expr.strip_suffix("|raw") {
                Some(path) => (path.trim(), true),
                None => (expr, false),
            };
            let text = lookup(vars, path).map(stringify).unwrap_or_default();
            if raw || !self.config.escape {
                out.push_str(&text);
            } else {
                escape_into(&mut out, &text);
            }

            rest = &after[end + close.len()..];
        }

        out.push_str(rest);
        out
    }
}

#[async_trait]
impl TemplateEngine for PlaceholderEngine {
    async fn fetch(&self, template: &str, vars: &Map<String, Value>) -> Result<String, Error> {
        let relative = Path::new(template);
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(Error::Template(format!("invalid template name `{template}`")));
        }

        let file = self
            .config
            .view_path
            .join(format!("{template}.{}", self.config.view_suffix));
        trace!(file = %file.display(), "loading template");

        let content = tokio::fs::read_to_string(&file).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::TemplateNotFound(file.clone()),
            _ => Error::Io(e),
        })?;
        Ok(self.render(&content, vars))
    }

    fn display(&self, content: &str, vars: &Map<String, Value>) -> Result<String, Error> {
        Ok(self.render(content, vars))
    }
}

fn lookup<'a>(vars: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = vars.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn engine() -> PlaceholderEngine {
        PlaceholderEngine::new(&EngineConfig::default())
    }

    #[test]
    fn substitutes_and_escapes() {
        let out = engine()
            .display("<p>{$name}</p>{$html|raw}", &vars(json!({"name": "<b>", "html": "<i>x</i>"})))
            .unwrap();
        assert_eq!(out, "<p>&lt;b&gt;</p><i>x</i>");
    }

    #[test]
    fn nested_paths_and_missing_values() {
        let out = engine()
            .display("{$user.name}/{$user.tags.1}/{$nope}", &vars(json!({"user": {"name": "ann", "tags": ["a", "b"]}})))
            .unwrap();
        assert_eq!(out, "ann/b/");
    }

    #[test]
    fn non_strings_render_as_json() {
        let out = engine().display("{$n} {$ok}", &vars(json!({"n": 3, "ok": true}))).unwrap();
        assert_eq!(out, "3 true");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let out = engine().display("a {$name", &vars(json!({"name": "x"}))).unwrap();
        assert_eq!(out, "a {$name");
    }

    #[test]
    fn custom_delimiters() {
        let config = EngineConfig { tpl_begin: "{{".into(), tpl_end: "}}".into(), ..EngineConfig::default() };
        let out = PlaceholderEngine::new(&config)
            .display("{{$a}} {$a}", &vars(json!({"a": 1})))
            .unwrap();
        assert_eq!(out, "1 {$a}");
    }

    #[tokio::test]
    async fn fetch_reads_from_view_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("user")).unwrap();
        std::fs::write(dir.path().join("user/read.html"), "hi {$name}").unwrap();

        let config = EngineConfig { view_path: dir.path().to_path_buf(), ..EngineConfig::default() };
        let engine = PlaceholderEngine::new(&config);

        let out = engine.fetch("user/read", &vars(json!({"name": "ann"}))).await.unwrap();
        assert_eq!(out, "hi ann");

        let missing = engine.fetch("user/none", &Map::new()).await;
        assert!(matches!(missing, Err(Error::TemplateNotFound(_))));

        let escape = engine.fetch("../secret", &Map::new()).await;
        assert!(matches!(escape, Err(Error::Template(_))));
    }
}
