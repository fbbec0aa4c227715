//! Controller middleware.
//!
//! Middleware is registered once on the [`App`](crate::App) under a name.
//! Controllers declare which names they want, optionally scoped to some
//! actions with `only` / `except`:
//!
//! ```rust
//! use keel::MiddlewareEntry;
//!
//! let declared = vec![
//!     MiddlewareEntry::from("log"),
//!     MiddlewareEntry::scoped("auth").except(["login"]),
//!     MiddlewareEntry::scoped("admin").only(["delete", "update"]),
//! ];
//! ```
//!
//! For every request the entries that apply to the current action run their
//! [`Middleware::before`] hooks in declaration order, then the action runs,
//! then the [`Middleware::after`] hooks run in reverse order.

mod pipeline;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

pub(crate) use pipeline::Pipeline;

/// A request interceptor.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Runs before the action. `Err(response)` short-circuits the request:
    /// later middleware and the action are skipped, and `response` goes
    /// through the `after` hooks of this middleware and the ones before it.
    async fn before(&self, _req: &mut Request) -> Result<(), Response> {
        Ok(())
    }

    /// Runs after the action with its response.
    async fn after(&self, res: Response) -> Response {
        res
    }
}

// ── Declarations ──────────────────────────────────────────────────────────────

/// One entry of a controller's middleware list.
#[derive(Clone, Debug, PartialEq)]
pub enum MiddlewareEntry {
    /// Applies to every action.
    Always(String),
    /// Applies depending on the current action.
    Scoped {
        name: String,
        only: Option<Vec<String>>,
        except: Option<Vec<String>>,
    },
}

impl MiddlewareEntry {
    /// A keyed entry with no action lists yet (applies everywhere until
    /// `only` / `except` narrow it).
    pub fn scoped(name: impl Into<String>) -> Self {
        Self::Scoped { name: name.into(), only: None, except: None }
    }

    /// Restricts the entry to the listed actions.
    pub fn only<I, S>(self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = actions.into_iter().map(Into::into).collect();
        match self {
            Self::Always(name) => Self::Scoped { name, only: Some(list), except: None },
            Self::Scoped { name, except, .. } => Self::Scoped { name, only: Some(list), except },
        }
    }

    /// Excludes the listed actions.
    pub fn except<I, S>(self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = actions.into_iter().map(Into::into).collect();
        match self {
            Self::Always(name) => Self::Scoped { name, only: None, except: Some(list) },
            Self::Scoped { name, only, .. } => Self::Scoped { name, only, except: Some(list) },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Always(name) | Self::Scoped { name, .. } => name,
        }
    }

    /// Whether this entry applies to `action`.
    ///
    /// `only` is consulted first: an action missing from it is skipped. Then
    /// `except`: an action listed there is skipped. Action names compare
    /// ASCII case-insensitively.
    pub fn applies_to(&self, action: &str) -> bool {
        let Self::Scoped { only, except, .. } = self else {
            return true;
        };
        let listed = |list: &[String]| list.iter().any(|a| a.eq_ignore_ascii_case(action));

        if only.as_deref().is_some_and(|list| !listed(list)) {
            false
        } else {
            !except.as_deref().is_some_and(listed)
        }
    }
}

impl From<&str> for MiddlewareEntry {
    fn from(name: &str) -> Self { Self::Always(name.to_owned()) }
}

impl From<String> for MiddlewareEntry {
    fn from(name: String) -> Self { Self::Always(name) }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Middleware by name, owned by the [`App`](crate::App).
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, middleware: impl Middleware) {
        self.entries.insert(name.to_owned(), Arc::new(middleware));
    }

    /// Resolves a middleware requested by a controller.
    pub fn controller(&self, name: &str) -> Result<Arc<dyn Middleware>, Error> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownMiddleware(name.to_owned()))
    }
}
