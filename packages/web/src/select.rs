//! Render target selection: which component operation answers a request.
//!
//! The default policy implements the partial-render convention. A request
//! carrying the marker header and a fragment name gets the component the
//! fragment converts to; everything else gets the default component. The
//! whole policy is pluggable through `MountOptions::selector`.

use std::io::Write;
use std::sync::Arc;

use http::HeaderMap;
use hypertree_core::ident::{fragment_to_component, kebab_name};
use tracing::debug;

use crate::error::SelectError;
use crate::headers;
use crate::node::PageNode;
use crate::resolve::RenderContext;

/// Name of the default component answering full-page requests.
pub const DEFAULT_COMPONENT: &str = "Page";

/// The selection-relevant slice of a request.
#[derive(Debug, Clone)]
pub struct SelectRequest {
    /// True when the partial-render marker header was present.
    pub partial: bool,
    /// Hyphenated fragment name from the fragment header, if any.
    pub fragment: Option<String>,
    /// Raw request-target string, kept for lazy callable matching.
    pub raw_target: String,
}

impl SelectRequest {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let partial = headers
            .get(headers::PARTIAL_MARKER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let raw_target = headers
            .get(headers::FRAGMENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let fragment = {
            let trimmed = raw_target.trim_start_matches('#');
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };
        Self {
            partial,
            fragment,
            raw_target,
        }
    }
}

/// Read-only view of a node handed to selectors.
pub struct NodeView<'a> {
    node: &'a PageNode,
}

impl<'a> NodeView<'a> {
    pub(crate) fn new(node: &'a PageNode) -> Self {
        Self { node }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.node.name()
    }

    #[must_use]
    pub fn has_component(&self, name: &str) -> bool {
        self.node.component(name).is_some()
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.node.component_names()
    }
}

/// A free-standing render callable, matched lazily against the fragment.
#[derive(Clone)]
pub struct LazyCallable {
    /// Hyphenated callable name to compare against the fragment.
    pub(crate) name: String,
    pub(crate) call:
        Arc<dyn Fn(&RenderContext, &mut dyn Write) -> anyhow::Result<()> + Send + Sync>,
}

impl LazyCallable {
    /// Wraps a free function or closure under a capitalized-word name;
    /// the stored name is its hyphenated form.
    pub fn new<F>(name: &str, call: F) -> Self
    where
        F: Fn(&RenderContext, &mut dyn Write) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: kebab_name(name),
            call: Arc::new(call),
        }
    }

    /// True when the hyphenated fragment names this callable, with an
    /// optional `page-name-` prefix stripped first.
    #[must_use]
    pub fn matches(&self, fragment: Option<&str>, page_name: &str) -> bool {
        let Some(fragment) = fragment else {
            return false;
        };
        let stripped = fragment
            .strip_prefix(page_name)
            .and_then(|rest| rest.strip_prefix('-'))
            .unwrap_or(fragment);
        stripped == self.name
    }
}

/// Per-request selection result. Never persisted across requests.
#[derive(Clone)]
pub enum RenderTarget {
    /// A component operation on the handling node, by name.
    Component { name: String },
    /// A lazily-matched free-standing callable.
    Callable(LazyCallable),
}

impl RenderTarget {
    #[must_use]
    pub fn component(name: &str) -> Self {
        Self::Component {
            name: name.to_string(),
        }
    }
}

/// Chooses the component operation answering a request.
pub trait RenderTargetSelector: Send + Sync {
    /// Selects a render target for `req` on `node`.
    ///
    /// # Errors
    ///
    /// A selector may fail; the error is recovered at the request
    /// boundary and handed to the configured error handler.
    fn select(&self, req: &SelectRequest, node: &NodeView<'_>) -> Result<RenderTarget, SelectError>;
}

/// Default selection policy.
///
/// With the partial marker and a fragment: convert the hyphenated
/// fragment to a capitalized-word name and look it up case-sensitively;
/// on a miss, strip the node's own hyphenated name as a prefix and retry;
/// then take the component name that is the longest suffix of the
/// converted fragment. An exact match always beats a suffix match and a
/// longer suffix beats a shorter one. Anything else, including an invalid
/// conversion or no marker at all, selects the default component.
pub struct DefaultSelector;

impl RenderTargetSelector for DefaultSelector {
    fn select(&self, req: &SelectRequest, node: &NodeView<'_>) -> Result<RenderTarget, SelectError> {
        if !req.partial {
            return Ok(RenderTarget::component(DEFAULT_COMPONENT));
        }
        let Some(fragment) = req.fragment.as_deref() else {
            return Ok(RenderTarget::component(DEFAULT_COMPONENT));
        };

        let Some(converted) = fragment_to_component(fragment) else {
            debug!(fragment, "fragment conversion invalid, full page fallback");
            return Ok(RenderTarget::component(DEFAULT_COMPONENT));
        };

        if node.has_component(&converted) {
            return Ok(RenderTarget::component(&converted));
        }

        // The fragment may carry the node's own name as a prefix, the way
        // generated element IDs do.
        if let Some(rest) = fragment
            .strip_prefix(node.name())
            .and_then(|rest| rest.strip_prefix('-'))
        {
            if let Some(stripped) = fragment_to_component(rest) {
                if node.has_component(&stripped) {
                    return Ok(RenderTarget::component(&stripped));
                }
            }
        }

        let suffix_match = node
            .component_names()
            .filter(|name| converted.ends_with(*name))
            .max_by_key(|name| name.len())
            .map(RenderTarget::component);
        if let Some(target) = suffix_match {
            return Ok(target);
        }

        debug!(fragment, node = node.name(), "no component for fragment, full page fallback");
        Ok(RenderTarget::component(DEFAULT_COMPONENT))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
