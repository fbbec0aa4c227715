//! Action trait and type erasure.
//!
//! # How actions are stored
//!
//! The router holds actions of many controllers in one tree per method, so
//! every action is erased behind `dyn ErasedAction`:
//!
//! ```text
//! async fn read(self) -> Response { … }            ← user writes this on `User`
//!        ↓ router.on(Method::GET, "/users/{id}", "read", User::read)
//! User::read.into_boxed_action()                   ← Action blanket impl
//!        ↓
//! Arc::new(ActionHandler { f: User::read, .. })    ← remembers `User`
//!        ↓  stored as BoxedAction = Arc<dyn ErasedAction>
//! action.call(app, req)  at request time           ← one vtable dispatch
//!        ↓
//! construct User, run middleware, User::read(user).await.into_response()
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::app::App;
use crate::controller::{self, Controller};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
#[doc(hidden)]
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Action` trait's `into_boxed_action` method.
#[doc(hidden)]
pub trait ErasedAction {
    fn call(&self, app: Arc<App>, req: Request) -> BoxFuture;

    /// Name of the controller the action belongs to.
    fn controller(&self) -> &'static str;
}

/// A type-erased action shared across concurrent requests.
#[doc(hidden)]
pub type BoxedAction = Arc<dyn ErasedAction + Send + Sync + 'static>;

// ── Public Action trait ───────────────────────────────────────────────────────

/// Implemented for every valid controller action.
///
/// Satisfied by any function taking the controller by value:
///
/// ```text
/// async fn name(self) -> impl IntoResponse
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Action<C>: private::Sealed<C> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_action(self) -> BoxedAction;
}

mod private {
    pub trait Sealed<C> {}
}

impl<C, F, Fut, R> private::Sealed<C> for F
where
    C: Controller,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<C, F, Fut, R> Action<C> for F
where
    C: Controller,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_action(self) -> BoxedAction {
        Arc::new(ActionHandler { f: Arc::new(self), _controller: PhantomData })
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Holds the action function and remembers which controller it needs.
///
/// `fn() -> C` keeps the wrapper `Send + Sync` whatever `C` is.
struct ActionHandler<C, F> {
    f: Arc<F>,
    _controller: PhantomData<fn() -> C>,
}

impl<C, F, Fut, R> ErasedAction for ActionHandler<C, F>
where
    C: Controller,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, app: Arc<App>, req: Request) -> BoxFuture {
        // The future outlives `&self`, so it takes its own handle on `f`.
        let f = Arc::clone(&self.f);
        Box::pin(async move { controller::run::<C, F, Fut, R>(app, req, &*f).await })
    }

    fn controller(&self) -> &'static str {
        C::NAME
    }
}
