//! Request routing — exact and regex routes, composed middleware, not-found fallback.
//!
//! A [`Router`] is the setup-phase builder. Routes come in two kinds:
//!
//! | Kind    | Registered with                       | Matches                          | Params            |
//! |---------|---------------------------------------|----------------------------------|-------------------|
//! | Exact   | [`Router::register_exact`]            | the literal path, byte for byte  | *(none)*          |
//! | Pattern | [`Router::register_pattern`]          | wherever the regex matches       | named groups      |
//!
//! Once every route is registered, [`Router::build`] freezes the tables into a
//! [`Dispatcher`], which only reads them and can be shared across tasks.
//!
//! Resolution order for a request is fixed:
//!
//! 1. the exact route for `(method, path)`, if one exists;
//! 2. otherwise the first pattern route for `method`, in registration order,
//!    whose regex matches the path;
//! 3. otherwise the not-found handler (default: `404`).

use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::context::Context;
use crate::http::{InvalidMethod, Method, StatusCode};
use crate::middleware::{SharedMiddleware, compose};

mod dispatcher;
mod exact;
mod pattern;
mod route;

pub use dispatcher::Dispatcher;

use exact::{ExactRegistry, validate_path};
use pattern::PatternRegistry;
use route::Route;

/// The boxed future every handler and middleware layer returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Type-erased async handler. It receives the request's [`Context`] and writes
/// its response through [`Context::writer`].
///
/// Stored behind `Arc<dyn Fn(…)>` so composed chains can be shared across
/// threads without copying the underlying closures.
pub type Handler = Arc<dyn Fn(Context) -> HandlerFuture + Send + Sync + 'static>;

/// Erases an async handler function into a [`Handler`].
///
/// Any `Fn(Context) -> impl Future<Output = ()> + Send` that is also
/// `Send + Sync + 'static` qualifies, including `async fn` items.
pub fn handler_fn<H, F>(handler: H) -> Handler
where
    H: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |ctx: Context| -> HandlerFuture { Box::pin(handler(ctx)) })
}

/// Registration failures. The router is left unchanged when one is returned.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    InvalidMethod(#[from] InvalidMethod),

    #[error("invalid route path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("route already registered: {method} {path}")]
    DuplicateRoute { method: Method, path: String },

    #[error("invalid route pattern: {0}")]
    InvalidPattern(String),
}

impl From<Infallible> for RouterError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Setup-phase route table.
///
/// # Examples
///
/// ```rust,no_run
/// use rtmux::{Method, Router, middleware::{logger, recoverer}};
///
/// # async fn example() -> Result<(), rtmux::router::RouterError> {
/// let mut router = Router::new();
///
/// router.register_exact(Method::Get, "/ping", |ctx| async move {
///     ctx.writer().write("pong");
/// }, [logger()])?;
///
/// router.register_pattern(Method::Get, r"^/users/(?P<id>\d+)$", |ctx| async move {
///     let id = ctx.path_params().ok().and_then(|p| p.get("id")).unwrap_or("?").to_owned();
///     ctx.writer().write(id);
/// }, [recoverer()])?;
///
/// let dispatcher = router.build();
/// # let _ = dispatcher;
/// # Ok(())
/// # }
/// ```
pub struct Router {
    exact: ExactRegistry,
    patterns: PatternRegistry,
    not_found: Handler,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("exact_routes", &self.exact.len())
            .field("pattern_routes", &self.patterns.len())
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Creates an empty router with the default `404` not-found handler.
    pub fn new() -> Self {
        Self {
            exact: ExactRegistry::default(),
            patterns: PatternRegistry::default(),
            not_found: default_not_found(),
        }
    }

    /// Registers `handler` for requests whose method and path equal `method`
    /// and `path` exactly.
    ///
    /// `middlewares` are composed around the handler now, first element
    /// outermost, so the stored route is the finished chain.
    ///
    /// # Errors
    ///
    /// - [`RouterError::InvalidMethod`] — `method` is not a routable method.
    /// - [`RouterError::InvalidPath`] — `path` is empty, does not start with
    ///   `/`, or contains whitespace, control characters, `?` or `#`.
    /// - [`RouterError::DuplicateRoute`] — `(method, path)` is already taken.
    pub fn register_exact<M, H, F>(
        &mut self,
        method: M,
        path: &str,
        handler: H,
        middlewares: impl IntoIterator<Item = SharedMiddleware>,
    ) -> Result<(), RouterError>
    where
        M: TryInto<Method>,
        M::Error: Into<RouterError>,
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        let method: Method = method.try_into().map_err(Into::<RouterError>::into)?;
        validate_path(path)?;

        let handler = compose(handler_fn(handler), middlewares);
        self.exact.insert(method, path, handler)?;
        debug!(%method, path, "registered exact route");
        Ok(())
    }

    /// Registers `handler` for requests with `method` whose path matches
    /// `pattern`.
    ///
    /// `pattern` may be a compiled [`Regex`] or a pattern source string.
    /// Matching is unanchored; use `^…$` to match whole paths. Named groups
    /// that participate in a match are exposed through
    /// [`Context::path_params`].
    ///
    /// Overlap with earlier patterns is not an error: the earlier pattern wins
    /// for every path both accept.
    ///
    /// # Errors
    ///
    /// - [`RouterError::InvalidMethod`] — `method` is not a routable method.
    /// - [`RouterError::InvalidPattern`] — `pattern` does not compile.
    pub fn register_pattern<M, P, H, F>(
        &mut self,
        method: M,
        pattern: P,
        handler: H,
        middlewares: impl IntoIterator<Item = SharedMiddleware>,
    ) -> Result<(), RouterError>
    where
        M: TryInto<Method>,
        M::Error: Into<RouterError>,
        P: TryInto<Regex>,
        P::Error: fmt::Display,
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        let method: Method = method.try_into().map_err(Into::<RouterError>::into)?;
        let regex: Regex = pattern
            .try_into()
            .map_err(|e| RouterError::InvalidPattern(e.to_string()))?;

        let handler = compose(handler_fn(handler), middlewares);
        debug!(%method, pattern = regex.as_str(), "registered pattern route");
        self.patterns.push(Route::pattern(method, regex, handler));
        Ok(())
    }

    /// Replaces the handler invoked when no route matches.
    ///
    /// The not-found handler runs without any route middleware.
    pub fn set_not_found_handler<H, F>(&mut self, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        self.not_found = handler_fn(handler);
    }

    /// Total number of registered routes, exact and pattern.
    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freezes the route tables into a [`Dispatcher`].
    pub fn build(self) -> Dispatcher {
        debug!(
            exact = self.exact.len(),
            patterns = self.patterns.len(),
            "route tables frozen"
        );
        Dispatcher::new(self.exact, self.patterns, self.not_found)
    }
}

fn default_not_found() -> Handler {
    handler_fn(|ctx: Context| async move {
        ctx.writer().write_status(StatusCode::NotFound);
        ctx.writer().write("404 page not found");
    })
}
