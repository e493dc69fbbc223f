//! Serves a handful of exact and pattern routes on 127.0.0.1:8080.
//!
//! ```text
//! RUST_LOG=debug cargo run --example dispatcher
//! curl localhost:8080/get
//! curl localhost:8080/resources/1/subresources/2
//! curl -X PUT localhost:8080/panic
//! ```

use std::sync::Arc;

use rtmux::{
    Context, Method, Router, StatusCode,
    middleware::{logger, recoverer},
    server::Server,
};
use tracing_subscriber::EnvFilter;

const RESOURCE: &str = r"^/resources/(?P<resourceId>\d+)/subresources/(?P<subresourceId>\d+)$";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut router = Router::new();

    router.register_exact(
        Method::Get,
        "/get",
        |ctx: Context| async move { ctx.writer().write("GET") },
        [logger()],
    )?;

    router.register_pattern(
        Method::Get,
        RESOURCE,
        |ctx: Context| async move {
            let params = match ctx.path_params() {
                Ok(params) => params,
                Err(e) => {
                    ctx.writer().write_status(StatusCode::InternalServerError);
                    ctx.writer().write(e.to_string());
                    return;
                }
            };
            let body = format!(
                "resource {} / subresource {}",
                params.get("resourceId").unwrap_or("?"),
                params.get("subresourceId").unwrap_or("?"),
            );
            ctx.writer().write(body);
        },
        [logger(), recoverer()],
    )?;

    router.register_exact(
        Method::Put,
        "/panic",
        |_ctx: Context| async { panic!("demo panic") },
        [logger(), recoverer()],
    )?;

    router.set_not_found_handler(|ctx: Context| async move {
        ctx.writer().write_status(StatusCode::NotFound);
        ctx.writer().write(format!("no route for {} {}", ctx.request().method(), ctx.request().path()));
    });

    let server = Server::bind("127.0.0.1:8080").await?;
    server.serve(Arc::new(router.build())).await?;
    Ok(())
}
