use std::fmt;

use tracing::debug;

use super::{Handler, exact::ExactRegistry, pattern::PatternRegistry};
use crate::{
    context::Context,
    http::{Request, Response, ResponseWriter},
};

/// Frozen route tables, ready to serve requests.
///
/// Built by [`Router::build`](super::Router::build). Dispatch only reads the
/// tables, so one `Dispatcher` can be shared behind an `Arc` by any number of
/// concurrent tasks.
pub struct Dispatcher {
    exact: ExactRegistry,
    patterns: PatternRegistry,
    not_found: Handler,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("exact", &self.exact)
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub(super) fn new(exact: ExactRegistry, patterns: PatternRegistry, not_found: Handler) -> Self {
        Self {
            exact,
            patterns,
            not_found,
        }
    }

    /// Number of routes, exact and pattern.
    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatches `request` and returns the response the chain wrote.
    ///
    /// Never fails: unmatched requests go to the not-found handler. A panic in
    /// a route without a [`RecoveryGuard`](crate::middleware::RecoveryGuard)
    /// propagates out of the returned future.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use rtmux::{Method, Request, Router, StatusCode};
    ///
    /// # async fn example() {
    /// let mut router = Router::new();
    /// router
    ///     .register_exact(Method::Get, "/ping", |ctx| async move { ctx.writer().write("pong") }, [])
    ///     .unwrap();
    /// let dispatcher = router.build();
    ///
    /// let response = dispatcher.dispatch(Request::new(Method::Get, "/ping")).await;
    /// assert_eq!(response.status(), StatusCode::Ok);
    /// assert_eq!(response.text(), "pong");
    /// # }
    /// ```
    pub async fn dispatch(&self, request: Request) -> Response {
        let writer = ResponseWriter::new();
        self.dispatch_with(request, &writer).await;
        writer.finish()
    }

    /// Dispatches `request`, writing through a writer owned by the caller.
    pub async fn dispatch_with(&self, request: Request, writer: &ResponseWriter) {
        let method = request.method();

        if let Some(route) = self.exact.get(method, request.path()) {
            debug!(%method, path = request.path(), "exact route matched");
            let ctx = Context::new(request, writer.clone());
            return (route.handler)(ctx).await;
        }

        if let Some((route, params)) = self.patterns.find(method, request.path()) {
            debug!(
                %method,
                path = request.path(),
                params = params.len(),
                "pattern route matched"
            );
            let ctx = Context::with_params(request, writer.clone(), params);
            return (route.handler)(ctx).await;
        }

        debug!(%method, path = request.path(), "no route matched");
        (self.not_found)(Context::new(request, writer.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        context::ContextError,
        http::{Method, StatusCode},
        middleware::{SharedMiddleware, logger, middleware_fn, recoverer},
        router::Router,
    };

    fn request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    fn respond(body: &'static str) -> impl Fn(Context) -> std::future::Ready<()> + Send + Sync {
        move |ctx| {
            ctx.writer().write(body);
            std::future::ready(())
        }
    }

    fn param(name: &'static str) -> impl Fn(Context) -> std::future::Ready<()> + Send + Sync {
        move |ctx| {
            match ctx.path_params() {
                Ok(params) => ctx.writer().write(params.get(name).unwrap_or("<absent>")),
                Err(e) => ctx.writer().write(e.to_string()),
            }
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn exact_routes_per_method() {
        let mut router = Router::new();
        router.register_exact(Method::Get, "/get", respond("GET"), [logger()]).unwrap();
        router.register_exact(Method::Post, "/post", respond("POST"), []).unwrap();
        router.register_exact(Method::Put, "/put", respond("PUT"), []).unwrap();
        let dispatcher = router.build();

        for (method, path, want) in [("GET", "/get", "GET"), ("POST", "/post", "POST"), ("PUT", "/put", "PUT")] {
            let response = dispatcher.dispatch(request(method, path)).await;
            assert_eq!(response.status(), StatusCode::Ok, "{method} {path}");
            assert_eq!(response.text(), want, "{method} {path}");
        }
    }

    #[tokio::test]
    async fn unmatched_requests_get_404() {
        let mut router = Router::new();
        router.register_exact(Method::Put, "/put", respond("PUT"), [recoverer()]).unwrap();
        let dispatcher = router.build();

        for (method, path) in [("GET", "/get"), ("POST", "/post"), ("GET", "/put")] {
            let response = dispatcher.dispatch(request(method, path)).await;
            assert_eq!(response.status(), StatusCode::NotFound, "{method} {path}");
        }
    }

    #[tokio::test]
    async fn exact_route_prefix_plus_segment_is_404() {
        let mut router = Router::new();
        router.register_exact(Method::Put, "/put", respond("PUT"), [recoverer()]).unwrap();
        let dispatcher = router.build();

        let response = dispatcher.dispatch(request("PUT", "/put/poi")).await;
        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.text(), "404 page not found");
    }

    #[tokio::test]
    async fn pattern_captures_reach_handler() {
        let pattern = r"^/resources/(?P<resourceId>\d+)/subresources/(?P<subresourceId>\d+)$";
        let mut router = Router::new();
        router.register_pattern(Method::Get, pattern, param("resourceId"), []).unwrap();
        router.register_pattern(Method::Post, pattern, param("subresourceId"), []).unwrap();
        let dispatcher = router.build();

        let get = dispatcher.dispatch(request("GET", "/resources/1/subresources/2")).await;
        assert_eq!(get.text(), "1");
        let post = dispatcher.dispatch(request("POST", "/resources/1/subresources/2")).await;
        assert_eq!(post.text(), "2");
        let put = dispatcher.dispatch(request("PUT", "/resources/1/subresources/2")).await;
        assert_eq!(put.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn guarded_panics() {
        let mut router = Router::new();
        router
            .register_exact(Method::Put, "/put", |_ctx| async { panic!("panic!") }, [recoverer()])
            .unwrap();
        router
            .register_exact(
                Method::Get,
                "/get",
                |ctx: Context| async move {
                    ctx.writer().write("GET");
                    panic!("panic!");
                },
                [recoverer()],
            )
            .unwrap();
        let dispatcher = router.build();

        let put = dispatcher.dispatch(request("PUT", "/put")).await;
        assert_eq!(put.status(), StatusCode::InternalServerError);
        assert_eq!(put.text(), "Internal Server Error");

        let get = dispatcher.dispatch(request("GET", "/get")).await;
        assert_eq!(get.status(), StatusCode::Ok);
        assert_eq!(get.text(), "GET");
    }

    #[tokio::test]
    async fn exact_beats_pattern_regardless_of_order() {
        let mut router = Router::new();
        router
            .register_pattern(Method::Get, r"^/users/(?P<id>\w+)$", respond("pattern"), [])
            .unwrap();
        router.register_exact(Method::Get, "/users/me", respond("exact"), []).unwrap();
        let dispatcher = router.build();

        assert_eq!(dispatcher.dispatch(request("GET", "/users/me")).await.text(), "exact");
        assert_eq!(dispatcher.dispatch(request("GET", "/users/42")).await.text(), "pattern");
    }

    #[tokio::test]
    async fn first_overlapping_pattern_wins() {
        let mut router = Router::new();
        router.register_pattern(Method::Get, r"^/files/.+$", respond("P1"), []).unwrap();
        router.register_pattern(Method::Get, r"^/files/(?P<name>.+)$", respond("P2"), []).unwrap();
        let dispatcher = router.build();

        for _ in 0..3 {
            assert_eq!(dispatcher.dispatch(request("GET", "/files/a.txt")).await.text(), "P1");
        }
    }

    #[tokio::test]
    async fn exact_route_has_no_params_in_scope() {
        let mut router = Router::new();
        router.register_exact(Method::Get, "/plain", param("id"), []).unwrap();
        let dispatcher = router.build();

        let response = dispatcher.dispatch(request("GET", "/plain")).await;
        assert_eq!(response.text(), ContextError::NoPathParams.to_string());
    }

    #[tokio::test]
    async fn optional_group_absent_from_params() {
        let mut router = Router::new();
        router
            .register_pattern(
                Method::Get,
                r"^/docs/(?P<page>\w+)(?:/(?P<section>\w+))?$",
                |ctx: Context| async move {
                    let params = ctx.path_params().unwrap();
                    let body = format!(
                        "{}:{}:{}",
                        params.get("page").unwrap_or("-"),
                        params.contains("section"),
                        params.len()
                    );
                    ctx.writer().write(body);
                },
                [],
            )
            .unwrap();
        let dispatcher = router.build();

        let short = dispatcher.dispatch(request("GET", "/docs/intro")).await;
        assert_eq!(short.text(), "intro:false:1");
        let long = dispatcher.dispatch(request("GET", "/docs/intro/setup")).await;
        assert_eq!(long.text(), "intro:true:2");
    }

    #[tokio::test]
    async fn custom_not_found_skips_route_middleware() {
        let hits = Arc::new(Mutex::new(0_u32));
        let counter: SharedMiddleware = {
            let hits = Arc::clone(&hits);
            middleware_fn(move |ctx, next| {
                *hits.lock().unwrap() += 1;
                next.run(ctx)
            })
        };

        let mut router = Router::new();
        router.register_exact(Method::Get, "/a", respond("a"), [counter]).unwrap();
        router.set_not_found_handler(|ctx: Context| async move {
            ctx.writer().write_status(StatusCode::NotFound);
            ctx.writer().write(format!("nothing at {}", ctx.request().path()));
        });
        let dispatcher = router.build();

        let response = dispatcher.dispatch(request("GET", "/b")).await;
        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.text(), "nothing at /b");
        assert_eq!(*hits.lock().unwrap(), 0);

        dispatcher.dispatch(request("GET", "/a")).await;
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn handler_that_writes_nothing_is_empty_200() {
        let mut router = Router::new();
        router.register_exact(Method::Delete, "/quiet", |_ctx| async {}, []).unwrap();
        let dispatcher = router.build();

        let response = dispatcher.dispatch(request("DELETE", "/quiet")).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(response.body_bytes().is_empty());
    }

    #[tokio::test]
    async fn dispatch_with_uses_caller_writer() {
        let mut router = Router::new();
        router.register_exact(Method::Get, "/w", respond("w"), []).unwrap();
        let dispatcher = router.build();

        let writer = ResponseWriter::new();
        dispatcher.dispatch_with(Request::new(Method::Get, "/w"), &writer).await;
        assert!(writer.is_committed());
        assert_eq!(writer.finish().text(), "w");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_dispatch_shares_tables() {
        let mut router = Router::new();
        router.register_pattern(Method::Get, r"^/n/(?P<n>\d+)$", param("n"), []).unwrap();
        let dispatcher = Arc::new(router.build());

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let response = dispatcher.dispatch(Request::new(Method::Get, &format!("/n/{i}"))).await;
                    (i, response.text())
                })
            })
            .collect();

        for task in tasks {
            let (i, body) = task.await.unwrap();
            assert_eq!(body, i.to_string());
        }
    }

    #[tokio::test]
    #[should_panic(expected = "unguarded")]
    async fn unguarded_panic_reaches_caller() {
        let mut router = Router::new();
        router
            .register_exact(Method::Get, "/boom", |_ctx| async { panic!("unguarded") }, [logger()])
            .unwrap();
        router.build().dispatch(request("GET", "/boom")).await;
    }
}
