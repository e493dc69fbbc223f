//! # rtmux
//!
//! A request dispatcher: exact routes, regex routes with named captures,
//! registration-time middleware composition, and a panic recovery guard that
//! never rewrites a response that was already committed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rtmux::{Method, Router, middleware::{logger, recoverer}, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router.register_exact(Method::Get, "/health", |ctx| async move {
//!         ctx.writer().write("ok");
//!     }, [logger()])?;
//!     router.register_pattern(Method::Get, r"^/users/(?P<id>\d+)$", |ctx| async move {
//!         let id = ctx.path_params().map(|p| p.get("id").unwrap_or_default().to_owned());
//!         ctx.writer().write(id.unwrap_or_default());
//!     }, [logger(), recoverer()])?;
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server.serve(Arc::new(router.build())).await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

pub use context::{Context, ContextError, PathParams};
pub use http::{Headers, Method, Request, Response, ResponseWriter, StatusCode};
pub use router::{Dispatcher, Router, RouterError};
pub use server::{Server, ServerConfig, ServerError};
