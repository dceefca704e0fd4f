//! The page tree: arena-owned nodes indexed by `NodeId`.
//!
//! Children are owned by the arena and referenced from the parent's index
//! list; the parent link is a plain index, never a second owner. The tree
//! is built once, single-threaded, and treated as read-only afterwards,
//! which makes unsynchronized concurrent reads safe.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use hypertree_core::args::ValueSet;
use hypertree_core::route::RouteSpec;

use crate::op::OpDescriptor;

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// One tree element: declared route metadata plus the live page instance.
pub struct PageNode {
    pub(crate) id: NodeId,
    /// Hyphenated display name, derived from the page type name.
    pub(crate) name: String,
    pub(crate) route: RouteSpec,
    pub(crate) title: String,
    /// Concatenation of every ancestor's path down to this node.
    pub(crate) full_route: String,
    pub(crate) page_type: TypeId,
    pub(crate) page_type_name: &'static str,
    pub(crate) instance: Arc<dyn Any + Send + Sync>,
    /// Seeds a dispatch pool with the typed instance (`Arc<P>`); erased
    /// here because the node no longer knows `P`.
    pub(crate) seed_pool: Arc<dyn Fn(&mut ValueSet) + Send + Sync>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) components: Vec<OpDescriptor>,
    pub(crate) data_ops: Vec<OpDescriptor>,
    pub(crate) middleware_op: Option<OpDescriptor>,
    pub(crate) lifecycle_op: Option<OpDescriptor>,
}

impl PageNode {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn route(&self) -> &RouteSpec {
        &self.route
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn full_route(&self) -> &str {
        &self.full_route
    }

    #[must_use]
    pub fn component(&self, name: &str) -> Option<&OpDescriptor> {
        self.components.iter().find(|op| op.name == name)
    }

    #[must_use]
    pub fn data_op(&self, name: &str) -> Option<&OpDescriptor> {
        self.data_ops.iter().find(|op| op.name == name)
    }

    /// Component names in declaration order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|op| op.name.as_str())
    }

    /// True when some operation on this node carries `name`, component or
    /// otherwise.
    #[must_use]
    pub fn has_operation(&self, name: &str) -> bool {
        self.component(name).is_some()
            || self.data_op(name).is_some()
            || self.middleware_op.as_ref().is_some_and(|op| op.name == name)
            || self.lifecycle_op.as_ref().is_some_and(|op| op.name == name)
    }

    #[must_use]
    pub(crate) fn node_ref(&self) -> NodeRef {
        NodeRef {
            id: self.id,
            name: self.name.clone(),
            route: self.full_route.clone(),
            title: self.title.clone(),
        }
    }
}

/// Lightweight handle to a node: metadata only, cheap to clone, and
/// injectable into operations.
#[derive(Debug, Clone)]
pub struct NodeRef {
    pub(crate) id: NodeId,
    pub name: String,
    /// Full route of the node.
    pub route: String,
    pub title: String,
}

impl NodeRef {
    /// Arena index of the referenced node, usable with [`PageTree::node`].
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// The built tree. Structurally immutable after build; node-owned
/// instance state is shared across all concurrent requests to the node.
pub struct PageTree {
    pub(crate) nodes: Vec<PageNode>,
    by_type: AHashMap<TypeId, NodeId>,
}

impl PageTree {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            by_type: AHashMap::new(),
        }
    }

    pub(crate) fn push(&mut self, node: PageNode) -> NodeId {
        let id = node.id;
        self.by_type.entry(node.page_type).or_insert(id);
        if let Some(parent) = node.parent {
            self.nodes[parent.0].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &PageNode {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn root(&self) -> &PageNode {
        &self.nodes[0]
    }

    #[must_use]
    pub(crate) fn node_for_type(&self, ty: TypeId) -> Option<NodeId> {
        self.by_type.get(&ty).copied()
    }

    /// Nodes in build order (parents before their children).
    pub fn iter(&self) -> impl Iterator<Item = &PageNode> {
        self.nodes.iter()
    }

    /// Ancestor chain of `id` from the root down to `id` itself.
    #[must_use]
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.nodes[current.0].parent;
        }
        chain.reverse();
        chain
    }
}

impl fmt::Debug for PageTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTree")
            .field(
                "nodes",
                &self.nodes.iter().map(PageNode::name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
