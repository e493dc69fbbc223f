//! Panic recovery for a route's middleware chain.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tracing::{error, warn};

use crate::{
    context::Context,
    http::StatusCode,
    router::HandlerFuture,
};

use super::{Middleware, Next, SharedMiddleware};

const DEFAULT_BODY: &str = "Internal Server Error";

/// Catches panics raised anywhere below it in the chain.
///
/// The guard delegates straight to `next`, wrapping the whole downstream future
/// in `catch_unwind`. When that future panics:
///
/// - if the response is not yet committed, it writes `500 Internal Server Error`
///   with a short plain-text body;
/// - if the handler already committed a status or body, the response is left
///   exactly as written — a committed response cannot be retracted.
///
/// In both cases the panic stops here. Routes without a guard let the panic
/// reach the host server.
///
/// # Examples
///
/// ```rust,no_run
/// use rtmux::{Method, Router, middleware::recoverer};
///
/// let mut router = Router::new();
/// router
///     .register_exact(Method::Put, "/put", |_ctx| async { panic!("boom") }, [recoverer()])
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RecoveryGuard {
    body: String,
}

impl Default for RecoveryGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryGuard {
    pub fn new() -> Self {
        Self {
            body: DEFAULT_BODY.to_owned(),
        }
    }

    /// Replaces the body written alongside the `500` status.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

impl Middleware for RecoveryGuard {
    fn handle(&self, ctx: Context, next: Next) -> HandlerFuture {
        let body = self.body.clone();
        let writer = ctx.writer().clone();
        let method = ctx.request().method();
        let path = ctx.request().path().to_owned();

        Box::pin(async move {
            let Err(payload) = AssertUnwindSafe(next.run(ctx)).catch_unwind().await else {
                return;
            };

            let message = panic_message(&*payload);
            if writer.is_committed() {
                warn!(
                    %method,
                    %path,
                    panic = %message,
                    "handler panicked after committing a response; leaving it as written"
                );
            } else {
                error!(%method, %path, panic = %message, "handler panicked; responding 500");
                writer.set_header("Content-Type", "text/plain; charset=utf-8");
                writer.write_status(StatusCode::InternalServerError);
                writer.write(body);
            }
        })
    }
}

/// A shared [`RecoveryGuard`] with the default body.
pub fn recoverer() -> SharedMiddleware {
    Arc::new(RecoveryGuard::new())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
