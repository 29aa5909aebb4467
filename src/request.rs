//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{Extensions, Method};
use http_body_util::BodyExt;

/// An incoming HTTP request.
///
/// Filters borrow it mutably while it travels inward, so anything they attach
/// through [`attributes_mut`](Request::attributes_mut) stays visible to every
/// filter further in, to the terminal handler, and to termination hooks.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: HashMap<String, String>,
    attributes: Extensions,
}

impl Request {
    /// An empty request, for hosts other than the built-in server and for tests.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            params: HashMap::new(),
            attributes: Extensions::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Reads the full body off a hyper request.
    ///
    /// Header values that are not visible ASCII are dropped.
    pub(crate) async fn from_hyper(
        req: hyper::Request<hyper::body::Incoming>,
    ) -> Result<Self, hyper::Error> {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();

        let headers = parts.headers.iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            headers,
            body,
            params: HashMap::new(),
            attributes: Extensions::new(),
        })
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces every value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// Typed, request-scoped values attached by filters.
    pub fn attributes(&self) -> &Extensions { &self.attributes }

    /// Mutable access to the attribute set, e.g. to attach an authenticated user.
    pub fn attributes_mut(&mut self) -> &mut Extensions { &mut self.attributes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct UserId(u64);

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::new(Method::GET, "/").with_header("X-Age", "150");
        assert_eq!(req.header("x-age"), Some("150"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn set_header_replaces_existing_values() {
        let mut req = Request::new(Method::GET, "/")
            .with_header("accept", "text/html")
            .with_header("Accept", "application/json");
        req.set_header("ACCEPT", "*/*");
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.header("accept"), Some("*/*"));
    }

    #[test]
    fn attributes_survive_a_clone() {
        let mut req = Request::new(Method::POST, "/users");
        req.attributes_mut().insert(UserId(7));
        let copy = req.clone();
        assert_eq!(copy.attributes().get::<UserId>(), Some(&UserId(7)));
    }
}
