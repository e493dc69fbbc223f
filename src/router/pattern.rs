use std::collections::HashMap;

use super::route::Route;
use crate::{context::PathParams, http::Method};

/// Regex routes per method, in registration order.
///
/// Overlapping patterns are allowed; the earliest registration wins for every
/// path they share.
#[derive(Debug, Default)]
pub(crate) struct PatternRegistry {
    routes: HashMap<Method, Vec<Route>>,
}

impl PatternRegistry {
    pub(crate) fn push(&mut self, route: Route) {
        self.routes.entry(route.method).or_default().push(route);
    }

    /// Scans `method`'s routes in order and stops at the first match.
    pub(crate) fn find(&self, method: Method, path: &str) -> Option<(&Route, PathParams)> {
        self.routes
            .get(&method)?
            .iter()
            .find_map(|route| route.capture(path).map(|params| (route, params)))
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }
}
