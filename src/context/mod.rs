//! Per-request context — the value every middleware layer and handler receives.
//!
//! A [`Context`] bundles the [`Request`], the request's [`ResponseWriter`], and
//! the [`PathParams`] captured by a pattern route. Parameters travel inside the
//! context by value; nothing is stored globally or per thread.

use std::collections::HashMap;

use thiserror::Error;

use crate::http::{Request, ResponseWriter};

/// Returned by [`Context::path_params`] when the request carries no captured
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("no path parameters in scope for this request")]
    NoPathParams,
}

/// Named path parameters captured by the pattern route that matched.
///
/// Only groups that actually participated in the match are present; an
/// optional group that was not exercised is absent, not empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    /// Collects the named groups of `captures` that took part in the match.
    pub(crate) fn from_captures(regex: &regex::Regex, captures: &regex::Captures<'_>) -> Self {
        let map = regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_owned(), m.as_str().to_owned()))
            })
            .collect();
        Self { map }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for PathParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Per-request execution context.
pub struct Context {
    request: Request,
    writer: ResponseWriter,
    params: Option<PathParams>,
}

impl Context {
    /// Creates a context with no path parameters in scope.
    pub fn new(request: Request, writer: ResponseWriter) -> Self {
        Self {
            request,
            writer,
            params: None,
        }
    }

    pub(crate) fn with_params(request: Request, writer: ResponseWriter, params: PathParams) -> Self {
        Self {
            request,
            writer,
            params: Some(params),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The response sink for this request.
    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    /// Returns the parameters captured by the matching pattern route.
    ///
    /// # Errors
    ///
    /// [`ContextError::NoPathParams`] when the request was dispatched through an
    /// exact route or the not-found handler, or when this context was built
    /// outside of any dispatch.
    pub fn path_params(&self) -> Result<&PathParams, ContextError> {
        self.params.as_ref().ok_or(ContextError::NoPathParams)
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}

/// Free-function form of [`Context::path_params`].
pub fn path_params(ctx: &Context) -> Result<&PathParams, ContextError> {
    ctx.path_params()
}

#[cfg(test)]
mod tests {
    use regex::Regex;
    use serde::Deserialize;

    use super::*;
    use crate::http::Method;

    #[test]
    fn context_outside_dispatch_has_no_params() {
        let ctx = Context::new(Request::new(Method::Get, "/"), ResponseWriter::new());
        assert_eq!(ctx.path_params(), Err(ContextError::NoPathParams));
        assert_eq!(path_params(&ctx), Err(ContextError::NoPathParams));
    }

    #[test]
    fn captures_only_named_groups() {
        let re = Regex::new(r"^/a/(?P<x>\d+)/(\w+)$").unwrap();
        let caps = re.captures("/a/12/b").unwrap();
        let params = PathParams::from_captures(&re, &caps);
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("x"), Some("12"));
    }

    #[test]
    fn unexercised_optional_group_is_absent() {
        let re = Regex::new(r"^/files/(?P<name>\w+)(?:\.(?P<ext>\w+))?$").unwrap();
        let caps = re.captures("/files/readme").unwrap();
        let params = PathParams::from_captures(&re, &caps);
        assert_eq!(params.get("name"), Some("readme"));
        assert!(!params.contains("ext"));
    }

    #[test]
    fn empty_capture_is_present() {
        let re = Regex::new(r"^/q/(?P<term>\w*)$").unwrap();
        let caps = re.captures("/q/").unwrap();
        let params = PathParams::from_captures(&re, &caps);
        assert_eq!(params.get("term"), Some(""));
    }

    #[test]
    fn params_in_scope_when_injected() {
        let params: PathParams = [("id", "7")].into_iter().collect();
        let ctx = Context::with_params(
            Request::new(Method::Get, "/items/7"),
            ResponseWriter::new(),
            params,
        );
        assert_eq!(ctx.path_params().unwrap().get("id"), Some("7"));
    }

    #[test]
    fn json_body() {
        #[derive(Deserialize)]
        struct Payload {
            name: String,
        }

        let request = Request::new(Method::Post, "/users").with_body(r#"{"name":"ada"}"#);
        let ctx = Context::new(request, ResponseWriter::new());
        let payload: Payload = ctx.json().unwrap();
        assert_eq!(payload.name, "ada");
    }
}
