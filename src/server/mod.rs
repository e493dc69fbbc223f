//! Host HTTP/1.1 server for a [`Dispatcher`].
//!
//! Accepts TCP connections on Tokio, parses requests, hands each one to the
//! dispatcher, and writes the finished response. Persistent connections
//! (keep-alive) are supported.
//!
//! Each request is dispatched in its own task. If a route without a recovery
//! guard panics, the panic ends that task; the server logs it and closes the
//! connection without writing a response.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};
use crate::router::Dispatcher;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Connection-level limits.
///
/// Deserializable so it can be embedded in an application's own config file;
/// missing fields fall back to the defaults.
///
/// ```
/// use rtmux::server::ServerConfig;
///
/// let config: ServerConfig = serde_json::from_str(r#"{"max_request_size": 1024}"#).unwrap();
/// assert_eq!(config.max_request_size, 1024);
/// assert_eq!(config.initial_buffer_size, ServerConfig::default().initial_buffer_size);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Largest request (head and body) buffered before answering `413`.
    pub max_request_size: usize,
    /// Initial read buffer capacity per connection.
    pub initial_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_request_size: 8 * 1024 * 1024,
            initial_buffer_size: 4096,
        }
    }
}

/// A bound listener that serves a [`Dispatcher`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rtmux::{Method, Router, server::Server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut router = Router::new();
///     router.register_exact(Method::Get, "/", |ctx| async move { ctx.writer().write("Hello!") }, [])?;
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.serve(Arc::new(router.build())).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
}

impl Server {
    /// Binds to `addr` with the default [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        Self::bind_with_config(addr, ServerConfig::default()).await
    }

    /// Binds to `addr` with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind_with_config(
        addr: impl AsRef<str>,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections forever, dispatching every request to `dispatcher`.
    ///
    /// # Errors
    ///
    /// Accept failures are logged and skipped, so this only returns if the
    /// listener itself becomes unusable.
    pub async fn serve(self, dispatcher: Arc<Dispatcher>) -> Result<(), ServerError> {
        let config = Arc::new(self.config);
        info!(address = %self.local_addr, routes = dispatcher.len(), "rtmux listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let dispatcher = Arc::clone(&dispatcher);
            let config = Arc::clone(&config);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, dispatcher, &config).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Serves one TCP connection until the peer closes it, asks for
/// `Connection: close`, or a handler panics.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    config: &ServerConfig,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(config.initial_buffer_size);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        if buf.len() > config.max_request_size {
            warn!(peer = %peer_addr, "request too large — sending 413");
            let response = Response::new(StatusCode::PayloadTooLarge)
                .body("Request entity too large")
                .keep_alive(false);
            stream.write_all(&response.into_bytes()).await?;
            break;
        }

        let (request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => continue,
            Err(RequestError::UnsupportedMethod(e)) => {
                warn!(peer = %peer_addr, error = %e, "unsupported method — sending 501");
                let response = Response::new(StatusCode::NotImplemented)
                    .body(e.to_string())
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                let response = Response::new(StatusCode::BadRequest)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };

        let content_length = request.content_length().unwrap_or(0);
        let total_needed = match body_offset.checked_add(content_length) {
            Some(total) if total <= config.max_request_size => total,
            _ => {
                warn!(peer = %peer_addr, content_length, "declared body too large — sending 413");
                let response = Response::new(StatusCode::PayloadTooLarge)
                    .body("Request entity too large")
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };
        if buf.len() < total_needed {
            continue;
        }

        // Re-slice the body to exactly Content-Length; pipelined bytes stay buffered.
        let request = request.with_body(buf[body_offset..total_needed].to_vec());
        let keep_alive = request.is_keep_alive();
        let method = request.method();
        let path = request.path().to_owned();

        debug!(peer = %peer_addr, %method, %path, "dispatching request");

        let task_dispatcher = Arc::clone(&dispatcher);
        let response = match tokio::spawn(async move { task_dispatcher.dispatch(request).await }).await {
            Ok(response) => response,
            Err(e) if e.is_panic() => {
                error!(peer = %peer_addr, %method, %path, "unguarded handler panic — closing connection");
                break;
            }
            Err(e) => {
                error!(peer = %peer_addr, error = %e, "dispatch task failed");
                break;
            }
        };

        stream.write_all(&response.keep_alive(keep_alive).into_bytes()).await?;
        stream.flush().await?;

        let _ = buf.split_to(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close — shutting down");
            break;
        }
    }

    Ok(())
}
