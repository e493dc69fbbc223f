//! Middleware — decorators composed around a route's handler at registration time.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — the already-composed remainder of the chain; call [`Next::run`]
//!   to delegate to it.
//! - [`wrap`] / [`compose`] — turn `[m1, m2, …, mn]` and a handler `H` into
//!   `m1(m2(…mn(H)…))`. The router does this once per route, not per request.
//! - [`LoggerMiddleware`] — request/response logger.
//! - [`RecoveryGuard`] — turns handler panics into `500` responses when
//!   nothing has been committed yet.

use std::{future::Future, sync::Arc};

use tokio::time::Instant;
use tracing::info;

use crate::{
    context::Context,
    router::{Handler, HandlerFuture},
};

pub mod recovery;

pub use recovery::{RecoveryGuard, recoverer};

/// A shareable middleware, as accepted by route registration.
pub type SharedMiddleware = Arc<dyn Middleware>;

/// The remainder of the chain below a middleware.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can delegate at
/// most once per request.
///
/// # Examples
///
/// ```rust,no_run
/// use rtmux::{context::Context, middleware::{Middleware, Next}, router::HandlerFuture};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(&self, ctx: Context, next: Next) -> HandlerFuture {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    inner: Handler,
}

impl Next {
    pub fn new(inner: Handler) -> Self {
        Self { inner }
    }

    /// Invokes the next layer with `ctx`.
    pub async fn run(self, ctx: Context) {
        (self.inner)(ctx).await
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`]. They may:
///
/// - **Pass through** — call `next.run(ctx).await` without modification.
/// - **Short-circuit** — write a response through `ctx.writer()` without
///   calling `next`.
/// - **Observe** — inspect the request before delegating and the writer's
///   state after.
///
/// Middleware is shared across Tokio tasks, so implementations must be
/// `Send + Sync` and must return a `Send` future.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> HandlerFuture;
}

/// Decorates `next` with `middleware`, producing a new handler.
///
/// This is the `middleware(next) -> handler` form of a [`Middleware`].
pub fn wrap(middleware: SharedMiddleware, next: Handler) -> Handler {
    Arc::new(move |ctx: Context| middleware.handle(ctx, Next::new(Arc::clone(&next))))
}

/// Composes `middlewares` around `handler`, first element outermost.
pub fn compose<I>(handler: Handler, middlewares: I) -> Handler
where
    I: IntoIterator<Item = SharedMiddleware>,
{
    let middlewares: Vec<SharedMiddleware> = middlewares.into_iter().collect();
    middlewares
        .into_iter()
        .rev()
        .fold(handler, |next, middleware| wrap(middleware, next))
}

struct FnMiddleware<F>(F);

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Context, Next) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, ctx: Context, next: Next) -> HandlerFuture {
        Box::pin((self.0)(ctx, next))
    }
}

/// Adapts an async closure into a [`SharedMiddleware`].
///
/// ```rust,no_run
/// use rtmux::middleware::middleware_fn;
///
/// let tag = middleware_fn(|ctx, next| async move {
///     ctx.writer().set_header("X-Served-By", "rtmux");
///     next.run(ctx).await;
/// });
/// ```
pub fn middleware_fn<F, Fut>(f: F) -> SharedMiddleware
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnMiddleware(f))
}

/// Logs each request's method, path, status, and duration.
///
/// Emits a single `tracing::info!` line after the downstream chain completes:
///
/// ```text
/// METHOD /path - STATUS (duration)
/// ```
///
/// It never alters control flow or the response. If the chain below it
/// panics, the panic passes through and nothing is logged.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> HandlerFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method();
            let path = ctx.request().path().to_owned();
            let writer = ctx.writer().clone();

            next.run(ctx).await;

            let duration = start.elapsed();
            let status = writer.status().map_or(200, |s| s.as_u16());
            info!("{} {} - {} ({:?})", method, path, status, duration);
        })
    }
}

/// A shared [`LoggerMiddleware`].
pub fn logger() -> SharedMiddleware {
    Arc::new(LoggerMiddleware)
}
