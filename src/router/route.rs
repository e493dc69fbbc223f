use std::fmt;

use regex::Regex;

use super::Handler;
use crate::{context::PathParams, http::Method};

// How a route recognises a path.
pub(crate) enum Matcher {
    Literal(String),
    Pattern(Regex),
}

// One registered binding. `handler` is the finished middleware chain.
pub(crate) struct Route {
    pub(crate) method: Method,
    pub(crate) matcher: Matcher,
    pub(crate) handler: Handler,
}

impl Route {
    pub(crate) fn exact(method: Method, path: &str, handler: Handler) -> Self {
        Self {
            method,
            matcher: Matcher::Literal(path.to_owned()),
            handler,
        }
    }

    pub(crate) fn pattern(method: Method, regex: Regex, handler: Handler) -> Self {
        Self {
            method,
            matcher: Matcher::Pattern(regex),
            handler,
        }
    }

    // Returns the captured parameters when the regex accepts `path`. Literal
    // routes are resolved by key lookup, never through here.
    pub(crate) fn capture(&self, path: &str) -> Option<PathParams> {
        match &self.matcher {
            Matcher::Literal(_) => None,
            Matcher::Pattern(regex) => regex
                .captures(path)
                .map(|caps| PathParams::from_captures(regex, &caps)),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matcher = match &self.matcher {
            Matcher::Literal(path) => path.as_str(),
            Matcher::Pattern(regex) => regex.as_str(),
        };
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("matcher", &matcher)
            .finish_non_exhaustive()
    }
}
