//! Node lookup and URL/ID generation.
//!
//! A [`TreeHandle`] is the cheap, clonable way into a built tree: find
//! nodes by page type, name reference, exact route, or predicate, and
//! generate URLs and element IDs from what you find. A [`RenderContext`]
//! wraps a handle with the current request's extracted path values, so
//! URL generation inside views inherits same-named placeholders unless
//! explicitly overridden.

use std::fmt;
use std::sync::Arc;

use hypertree_core::ident::kebab_name;
use hypertree_core::registry::DependencyRegistry;

use crate::error::LookupError;
use crate::node::{NodeId, NodeRef, PageNode, PageTree};
use crate::page::Page;
use crate::request::PathParams;

/// Prefix marking a CSS selector form of a generated ID.
const SELECTOR_MARKER: char = '#';

/// Shared handle to a built tree and its registry.
#[derive(Clone)]
pub struct TreeHandle {
    pub(crate) tree: Arc<PageTree>,
    pub(crate) registry: Arc<DependencyRegistry>,
}

impl TreeHandle {
    pub(crate) fn new(tree: Arc<PageTree>, registry: Arc<DependencyRegistry>) -> Self {
        Self { tree, registry }
    }

    #[must_use]
    pub fn registry(&self) -> &DependencyRegistry {
        &self.registry
    }

    /// Finds the node whose instance is of type `P`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] when no node holds a `P`.
    pub fn find_by_type<P: Page>(&self) -> Result<NodeRef, LookupError> {
        self.tree
            .node_for_type(std::any::TypeId::of::<P>())
            .map(|id| self.tree.node(id).node_ref())
            .ok_or_else(|| LookupError::NotFound {
                query: format!("type {}", std::any::type_name::<P>()),
            })
    }

    /// Finds a node by name reference: `"node"` or `"node.operation"`.
    ///
    /// # Errors
    ///
    /// Unqualified references error on zero matches and on ambiguity
    /// across multiple nodes; qualified references additionally error
    /// when the named node lacks the operation.
    pub fn find(&self, reference: &str) -> Result<NodeRef, LookupError> {
        let (name, operation) = match reference.split_once('.') {
            Some((name, op)) => (name, Some(op)),
            None => (reference, None),
        };

        let mut matches = self.tree.iter().filter(|node| node.name() == name);
        let Some(node) = matches.next() else {
            return Err(LookupError::NotFound {
                query: format!("name {reference:?}"),
            });
        };
        match operation {
            None => {
                if matches.next().is_some() {
                    return Err(LookupError::Ambiguous {
                        name: name.to_string(),
                    });
                }
                Ok(node.node_ref())
            }
            Some(op) => {
                if node.has_operation(op) {
                    Ok(node.node_ref())
                } else {
                    Err(LookupError::OperationMissing {
                        node: name.to_string(),
                        operation: op.to_string(),
                    })
                }
            }
        }
    }

    /// Finds a node by exact full route.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] when no node matches.
    pub fn find_route(&self, route: &str) -> Result<NodeRef, LookupError> {
        self.tree
            .iter()
            .find(|node| node.full_route() == route)
            .map(PageNode::node_ref)
            .ok_or_else(|| LookupError::NotFound {
                query: format!("route {route:?}"),
            })
    }

    /// Finds the first node satisfying `predicate`, in build order.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] when nothing matches.
    pub fn find_where<F>(&self, predicate: F) -> Result<NodeRef, LookupError>
    where
        F: Fn(&PageNode) -> bool,
    {
        self.tree
            .iter()
            .find(|node| predicate(node))
            .map(PageNode::node_ref)
            .ok_or_else(|| LookupError::NotFound {
                query: "predicate".to_string(),
            })
    }

    /// Generates a URL for a node named by reference, substituting path
    /// placeholders from `args`.
    ///
    /// # Errors
    ///
    /// Fails when the reference does not resolve or a placeholder has no
    /// value.
    pub fn url_for(&self, reference: &str, args: &UrlArgs) -> Result<String, LookupError> {
        self.url_with(reference, args, None)
    }

    pub(crate) fn url_with(
        &self,
        reference: &str,
        args: &UrlArgs,
        inherit: Option<&PathParams>,
    ) -> Result<String, LookupError> {
        let node = self.find(reference)?;
        substitute(&node.route, args, inherit)
    }

    /// Generates an element ID for `"node.Operation"`: the node's
    /// hyphenated name joined with the hyphenated operation name and any
    /// suffixes.
    ///
    /// # Errors
    ///
    /// Fails when the reference does not resolve.
    pub fn id_for(&self, reference: &str, suffixes: &[&str]) -> Result<String, LookupError> {
        let node = self.find(reference)?;
        let mut id = node.name.clone();
        if let Some((_, operation)) = reference.split_once('.') {
            id.push('-');
            id.push_str(&kebab_name(operation));
        }
        for suffix in suffixes {
            id.push('-');
            id.push_str(suffix);
        }
        Ok(id)
    }

    /// Like [`TreeHandle::id_for`], prefixed with the selector marker.
    ///
    /// # Errors
    ///
    /// Fails when the reference does not resolve.
    pub fn id_target(&self, reference: &str, suffixes: &[&str]) -> Result<String, LookupError> {
        Ok(format!("{SELECTOR_MARKER}{}", self.id_for(reference, suffixes)?))
    }
}

impl fmt::Debug for TreeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeHandle")
            .field("tree", &self.tree)
            .field("registry", &self.registry)
            .finish()
    }
}

/// Placeholder values for URL generation: named values win, positional
/// values fill the rest in order, and values extracted from the current
/// request inherit last.
#[derive(Debug, Clone, Default)]
pub struct UrlArgs {
    named: Vec<(String, String)>,
    positional: Vec<String>,
}

impl UrlArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a placeholder by name.
    #[must_use]
    pub fn set(mut self, name: &str, value: impl ToString) -> Self {
        self.named.push((name.to_string(), value.to_string()));
        self
    }

    /// Appends a positional placeholder value.
    #[must_use]
    pub fn push(mut self, value: impl ToString) -> Self {
        self.positional.push(value.to_string());
        self
    }
}

fn substitute(
    route: &str,
    args: &UrlArgs,
    inherit: Option<&PathParams>,
) -> Result<String, LookupError> {
    let mut out = String::new();
    let mut next_positional = 0;
    for segment in route.split('/').skip(1) {
        out.push('/');
        if let Some(name) = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .map(|s| s.trim_start_matches('*'))
        {
            let named = args
                .named
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone());
            let value = named
                .or_else(|| {
                    let v = args.positional.get(next_positional).cloned();
                    if v.is_some() {
                        next_positional += 1;
                    }
                    v
                })
                .or_else(|| inherit.and_then(|p| p.get(name)).map(ToString::to_string))
                .ok_or_else(|| LookupError::MissingPlaceholder {
                    route: route.to_string(),
                    name: name.to_string(),
                })?;
            out.push_str(&value);
        } else {
            out.push_str(segment);
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// Per-request context handed to every `Renderable`.
pub struct RenderContext {
    pub(crate) handle: TreeHandle,
    pub(crate) node: NodeId,
    pub(crate) params: PathParams,
    pub(crate) fragment: Option<String>,
}

impl RenderContext {
    /// The node whose component is rendering.
    #[must_use]
    pub fn node(&self) -> NodeRef {
        self.handle.tree.node(self.node).node_ref()
    }

    /// Title of the rendering node.
    #[must_use]
    pub fn title(&self) -> &str {
        self.handle.tree.node(self.node).title()
    }

    #[must_use]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// The requested fragment name, when this is a partial render.
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    #[must_use]
    pub fn handle(&self) -> &TreeHandle {
        &self.handle
    }

    /// URL generation that inherits same-named placeholder values from
    /// the current request unless `args` overrides them.
    ///
    /// # Errors
    ///
    /// Fails when the reference does not resolve or a placeholder has no
    /// value.
    pub fn url_for(&self, reference: &str, args: &UrlArgs) -> Result<String, LookupError> {
        self.handle.url_with(reference, args, Some(&self.params))
    }

    /// Element ID for an operation on the current node.
    #[must_use]
    pub fn id_for(&self, operation: &str, suffixes: &[&str]) -> String {
        let mut id = format!(
            "{}-{}",
            self.handle.tree.node(self.node).name(),
            kebab_name(operation)
        );
        for suffix in suffixes {
            id.push('-');
            id.push_str(suffix);
        }
        id
    }

    /// Like [`RenderContext::id_for`], prefixed with the selector marker.
    #[must_use]
    pub fn id_target(&self, operation: &str, suffixes: &[&str]) -> String {
        format!("{SELECTOR_MARKER}{}", self.id_for(operation, suffixes))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(tree: PageTree, registry: DependencyRegistry) -> Self {
        let handle = TreeHandle::new(Arc::new(tree), Arc::new(registry));
        Self {
            node: handle.tree.root().id,
            handle,
            params: PathParams::new(),
            fragment: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
