//! Per-request response sink with an explicit commit point.
//!
//! A [`ResponseWriter`] is shared by every layer that touches one request: the
//! dispatcher, each middleware and the handler. Writing a status or any body
//! bytes *commits* the response. After commit the status and headers are
//! frozen and only more body bytes can be appended, which is what lets the
//! recovery guard tell whether a 500 can still be substituted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use super::{Headers, Response, StatusCode};

#[derive(Debug, Default)]
struct WriterState {
    status: Option<StatusCode>,
    headers: Headers,
    body: Vec<u8>,
}

/// A cheaply cloneable handle to one request's response state.
///
/// # Examples
///
/// ```
/// use rtmux::http::{ResponseWriter, StatusCode};
///
/// let writer = ResponseWriter::new();
/// writer.set_header("Content-Type", "text/plain");
/// assert!(!writer.is_committed());
///
/// writer.write("hello");
/// assert!(writer.is_committed());
///
/// // Too late: the implicit 200 has already been committed.
/// writer.write_status(StatusCode::InternalServerError);
///
/// let response = writer.finish();
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.body_bytes(), b"hello");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    state: Arc<Mutex<WriterState>>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking handler never holds this lock, but poisoning must not turn
    // the recovery path into a second panic.
    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets a header. Ignored once the response is committed.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut state = self.lock();
        if state.status.is_some() {
            let name = name.into();
            warn!(header = %name, "header set after response was committed; ignoring");
            return;
        }
        state.headers.set(name, value);
    }

    /// Commits the response with `status`. Later status writes are ignored.
    pub fn write_status(&self, status: StatusCode) {
        let mut state = self.lock();
        match state.status {
            Some(committed) => warn!(
                committed = committed.as_u16(),
                attempted = status.as_u16(),
                "superfluous status write; response already committed"
            ),
            None => state.status = Some(status),
        }
    }

    /// Appends body bytes, committing a `200 OK` first if nothing was committed.
    pub fn write(&self, bytes: impl AsRef<[u8]>) {
        let mut state = self.lock();
        state.status.get_or_insert(StatusCode::Ok);
        state.body.extend_from_slice(bytes.as_ref());
    }

    /// Returns `true` once a status or any body bytes have been written.
    pub fn is_committed(&self) -> bool {
        self.lock().status.is_some()
    }

    /// Returns the committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.lock().status
    }

    /// Takes the accumulated state and turns it into a [`Response`].
    ///
    /// An uncommitted writer finishes as `200 OK` with an empty body. The
    /// writer is left empty and uncommitted.
    pub fn finish(&self) -> Response {
        let state = std::mem::take(&mut *self.lock());
        Response::from_parts(
            state.status.unwrap_or(StatusCode::Ok),
            state.headers,
            state.body,
        )
    }
}
