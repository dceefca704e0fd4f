//! Request-scoped values injectable into operations.

use axum::extract::RawPathParams;
use http::{HeaderMap, Method, Uri};

/// Path placeholder values extracted by the multiplexer, in match order.
///
/// Injectable into data and component operations, and the source of
/// inherited placeholder values for URL generation.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_raw(raw: &RawPathParams) -> Self {
        Self {
            entries: raw
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

/// Clonable view of the request line and headers, injectable into
/// operations and handed to the error handler. The body stays with the
/// multiplexer; form binding is caller middleware's business.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub(crate) fn from_request(req: &axum::extract::Request) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
        }
    }
}
