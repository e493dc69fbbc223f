use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::route::Route;
use super::{Handler, RouterError};
use crate::http::Method;

/// Literal routes keyed by method, then path.
#[derive(Debug, Default)]
pub(crate) struct ExactRegistry {
    routes: HashMap<Method, HashMap<String, Route>>,
}

impl ExactRegistry {
    /// Stores a literal route, or rejects `(method, path)` if it is taken.
    pub(crate) fn insert(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
    ) -> Result<(), RouterError> {
        match self.routes.entry(method).or_default().entry(path.to_owned()) {
            Entry::Occupied(_) => Err(RouterError::DuplicateRoute {
                method,
                path: path.to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Route::exact(method, path, handler));
                Ok(())
            }
        }
    }

    pub(crate) fn get(&self, method: Method, path: &str) -> Option<&Route> {
        self.routes.get(&method)?.get(path)
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }
}

/// Rejects paths that can never equal a request path.
pub(crate) fn validate_path(path: &str) -> Result<(), RouterError> {
    let reason = if path.is_empty() {
        "path is empty"
    } else if !path.starts_with('/') {
        "path must start with '/'"
    } else if path.chars().any(|c| c.is_whitespace() || c.is_control()) {
        "path contains whitespace or control characters"
    } else if path.contains(['?', '#']) {
        "path must not contain a query or fragment"
    } else {
        return Ok(());
    };

    Err(RouterError::InvalidPath {
        path: path.to_owned(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::Context;
    use crate::router::HandlerFuture;

    fn noop() -> Handler {
        Arc::new(|_ctx: Context| -> HandlerFuture { Box::pin(async {}) })
    }

    #[test]
    fn lookup_is_keyed_by_method_and_path() {
        let mut registry = ExactRegistry::default();
        registry.insert(Method::Get, "/get", noop()).unwrap();
        assert!(registry.get(Method::Get, "/get").is_some());
        assert!(registry.get(Method::Post, "/get").is_none());
        assert!(registry.get(Method::Get, "/get/").is_none());
        assert!(registry.get(Method::Get, "/GET").is_none());
    }

    #[test]
    fn prefix_does_not_match() {
        let mut registry = ExactRegistry::default();
        registry.insert(Method::Put, "/put", noop()).unwrap();
        assert!(registry.get(Method::Put, "/put/poi").is_none());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut registry = ExactRegistry::default();
        registry.insert(Method::Get, "/a", noop()).unwrap();
        let err = registry.insert(Method::Get, "/a", noop()).unwrap_err();
        assert!(matches!(
            err,
            RouterError::DuplicateRoute { method: Method::Get, ref path } if path == "/a"
        ));
        assert_eq!(registry.len(), 1);
        registry.insert(Method::Post, "/a", noop()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn valid_paths() {
        for path in ["/", "/get", "/a/b/c", "/%20encoded", "/with:colon"] {
            assert!(validate_path(path).is_ok(), "{path}");
        }
    }
}
