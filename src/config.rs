//! Application configuration, loaded from TOML.
//!
//! Every table and field is optional:
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:3000"
//!
//! [controller]
//! fail_exception = false
//! batch_validate = false
//!
//! [view]
//! type = "placeholder"
//! view_path = "view"
//! view_suffix = "html"
//!
//! [jump]
//! success_tmpl = "public/success"
//! error_tmpl = "public/error"
//! wait = 3
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::Error;
use crate::view::EngineConfig;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    pub view: EngineConfig,
    pub jump: JumpConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: "0.0.0.0:3000".to_owned() }
    }
}

/// Defaults every controller starts from.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Turn validation failures into [`Error::Validation`].
    pub fail_exception: bool,
    /// Collect every failing field instead of stopping at the first.
    pub batch_validate: bool,
}

/// Templates and timing for the `success` / `error` helpers.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct JumpConfig {
    pub success_tmpl: Option<String>,
    pub error_tmpl: Option<String>,
    /// Seconds before the rendered page follows its url.
    pub wait: u32,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self { success_tmpl: None, error_tmpl: None, wait: 3 }
    }
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, Error> {
        Ok(toml::from_str(content)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.addr, "0.0.0.0:3000");
        assert_eq!(config.view.kind, "placeholder");
        assert_eq!(config.jump.wait, 3);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [controller]
            fail_exception = true

            [view]
            view_path = "templates"
            escape = false
            "#,
        )
        .unwrap();
        assert!(config.controller.fail_exception);
        assert!(!config.controller.batch_validate);
        assert_eq!(config.view.view_path, std::path::PathBuf::from("templates"));
        assert_eq!(config.view.view_suffix, "html");
        assert!(!config.view.escape);
    }

    #[test]
    fn malformed_document_is_a_config_error() {
        let err = AppConfig::from_toml("[controller\nfail_exception = 1").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "[server]\naddr = \"127.0.0.1:8080\"\n").unwrap();
        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:8080");
    }
}
