//! Tree construction: turns a root page and its declared children into a
//! [`PageTree`] plus the seeded [`DependencyRegistry`].
//!
//! Each node's operations are classified at registration time into tagged
//! descriptors. Children are declared by type and built recursively with
//! a fresh `Default` instance, so sibling subtrees never share state.
//! Every node's instance is inserted into the registry under its
//! `Arc<P>` type; a page type appearing twice in the tree is therefore a
//! fatal duplicate. Lifecycle operations (`Init`) run immediately, parent
//! before children; any failure aborts the build.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use hypertree_core::args::ValueSet;
use hypertree_core::ident::type_kebab_name;
use hypertree_core::registry::DependencyRegistry;
use hypertree_core::route::{join_paths, RouteSpec};
use tracing::info;

use crate::dispatch::dispatch;
use crate::error::MountError;
use crate::node::{NodeId, PageNode, PageTree};
use crate::op::{ComponentFn, DataFn, LifecycleFn, MiddlewareFn, OpDescriptor, OpOutput};
use crate::page::Page;

/// Fixed name suffix marking data operations.
pub const DATA_SUFFIX: &str = "Data";
/// Exact name of the middleware operation.
pub const MIDDLEWARE_OP: &str = "Middlewares";
/// Exact name of the lifecycle operation.
pub const LIFECYCLE_OP: &str = "Init";

/// Collects one node's operations and children during `Page::configure`.
pub struct NodeBuilder<P> {
    node_name: String,
    components: Vec<OpDescriptor>,
    data_ops: Vec<OpDescriptor>,
    middleware_op: Option<OpDescriptor>,
    lifecycle_op: Option<OpDescriptor>,
    children: Vec<ChildSpec>,
    errors: Vec<MountError>,
    _marker: PhantomData<fn(P) -> P>,
}

struct ChildSpec {
    build: Box<dyn FnOnce(&mut TreeBuilder, NodeId) -> Result<(), MountError>>,
}

impl<P: Page> NodeBuilder<P> {
    fn new(node_name: String) -> Self {
        Self {
            node_name,
            components: Vec::new(),
            data_ops: Vec::new(),
            middleware_op: None,
            lifecycle_op: None,
            children: Vec::new(),
            errors: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Registers a component operation: a function over the page receiver
    /// returning a `Renderable`. The name `Page` is the default component
    /// answering full-page requests.
    pub fn component<F, A>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: ComponentFn<P, A>,
    {
        if name == MIDDLEWARE_OP || name == LIFECYCLE_OP || name.ends_with(DATA_SUFFIX) {
            self.errors.push(MountError::ReservedName {
                node: self.node_name.clone(),
                name: name.to_string(),
            });
            return self;
        }
        if self.check_duplicate(name) {
            return self;
        }
        self.components
            .push(OpDescriptor::component::<P, F, A>(name.to_string(), f));
        self
    }

    /// Registers a data operation. The name must carry the `Data` suffix;
    /// `StatsData` feeds the `Stats` component.
    pub fn data<F, A>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: DataFn<P, A>,
    {
        if !name.ends_with(DATA_SUFFIX) || name == DATA_SUFFIX {
            self.errors.push(MountError::DataSuffix {
                node: self.node_name.clone(),
                name: name.to_string(),
            });
            return self;
        }
        if self.check_duplicate(name) {
            return self;
        }
        self.data_ops
            .push(OpDescriptor::data::<P, F, A>(name.to_string(), f));
        self
    }

    /// Registers the node's middleware operation (`Middlewares`), invoked
    /// once at registration time to produce the node's ordered middleware
    /// list.
    pub fn middlewares<F, A>(&mut self, f: F) -> &mut Self
    where
        F: MiddlewareFn<P, A>,
    {
        if self.check_duplicate(MIDDLEWARE_OP) {
            return self;
        }
        self.middleware_op = Some(OpDescriptor::middleware::<P, F, A>(
            MIDDLEWARE_OP.to_string(),
            f,
        ));
        self
    }

    /// Registers the node's lifecycle operation (`Init`), invoked once at
    /// build time. A failure aborts the mount.
    pub fn init<F, A>(&mut self, f: F) -> &mut Self
    where
        F: LifecycleFn<P, A>,
    {
        if self.check_duplicate(LIFECYCLE_OP) {
            return self;
        }
        self.lifecycle_op = Some(OpDescriptor::lifecycle::<P, F, A>(
            LIFECYCLE_OP.to_string(),
            f,
        ));
        self
    }

    /// Declares a child node of type `C`, built from a fresh default
    /// instance, with its own route annotation.
    pub fn child<C: Page + Default>(&mut self, annotation: &str) -> &mut Self {
        let annotation = annotation.to_string();
        self.children.push(ChildSpec {
            build: Box::new(move |builder, parent| {
                builder
                    .add_node(&annotation, C::default(), Some(parent))
                    .map(|_| ())
            }),
        });
        self
    }

    fn check_duplicate(&mut self, name: &str) -> bool {
        let taken = self.components.iter().any(|op| op.name == name)
            || self.data_ops.iter().any(|op| op.name == name)
            || self.middleware_op.as_ref().is_some_and(|op| op.name == name)
            || self.lifecycle_op.as_ref().is_some_and(|op| op.name == name);
        if taken {
            self.errors.push(MountError::DuplicateOperation {
                node: self.node_name.clone(),
                name: name.to_string(),
            });
        }
        taken
    }
}

/// Builds the tree and registry in one pass, single-threaded.
pub(crate) struct TreeBuilder {
    tree: PageTree,
    registry: DependencyRegistry,
}

impl TreeBuilder {
    /// Builds a tree rooted at `root`, mounted at `annotation`.
    /// `fallback_title` applies to the root when its annotation carries
    /// no title of its own.
    pub(crate) fn build<R: Page>(
        annotation: &str,
        root: R,
        fallback_title: &str,
        registry: DependencyRegistry,
    ) -> Result<(PageTree, DependencyRegistry), MountError> {
        let mut builder = Self {
            tree: PageTree::new(),
            registry,
        };
        let root_id = builder.add_node(annotation, root, None)?;
        if builder.tree.node(root_id).title.is_empty() {
            builder.tree.nodes[root_id.0].title = fallback_title.to_string();
        }
        Ok((builder.tree, builder.registry))
    }

    fn add_node<P: Page>(
        &mut self,
        annotation: &str,
        page: P,
        parent: Option<NodeId>,
    ) -> Result<NodeId, MountError> {
        let route = RouteSpec::parse(annotation)?;
        let node_name = type_kebab_name(std::any::type_name::<P>());
        let instance = Arc::new(page);

        // Every node instance is registry-visible by type, which is what
        // lets operations on one node inject another node's page.
        self.registry.insert::<Arc<P>>(Arc::clone(&instance))?;

        let mut nb = NodeBuilder::<P>::new(node_name.clone());
        instance.configure(&mut nb);
        let NodeBuilder {
            components,
            data_ops,
            middleware_op,
            lifecycle_op,
            children,
            mut errors,
            ..
        } = nb;
        if let Some(err) = errors.drain(..).next() {
            return Err(err);
        }

        let full_route = match parent {
            Some(p) => join_paths(self.tree.node(p).full_route(), &route.path),
            None => join_paths("", &route.path),
        };

        let seed_instance = Arc::clone(&instance);
        let seed_pool = Arc::new(move |pool: &mut ValueSet| {
            pool.push(Arc::clone(&seed_instance));
        });

        let id = NodeId(self.tree.nodes.len());
        info!(
            node = %node_name,
            route = %full_route,
            components = components.len(),
            "page node built"
        );
        let node = PageNode {
            id,
            name: node_name.clone(),
            title: route.title.clone(),
            route,
            full_route,
            page_type: TypeId::of::<P>(),
            page_type_name: std::any::type_name::<P>(),
            instance,
            seed_pool,
            parent,
            children: Vec::new(),
            components,
            data_ops,
            middleware_op,
            lifecycle_op,
        };
        let id = self.tree.push(node);

        self.run_lifecycle(id)?;

        for child in children {
            (child.build)(self, id)?;
        }
        Ok(id)
    }

    fn run_lifecycle(&mut self, id: NodeId) -> Result<(), MountError> {
        let Some(op) = self.tree.node(id).lifecycle_op.clone() else {
            return Ok(());
        };
        let node = self.tree.node(id);
        let outcome = dispatch(node, &op, &self.registry, ValueSet::new()).map_err(|err| {
            MountError::Lifecycle {
                node: node.name.clone(),
                source: err.into(),
            }
        })?;
        match outcome {
            OpOutput::Lifecycle(Ok(())) => Ok(()),
            OpOutput::Lifecycle(Err(err)) => Err(MountError::Lifecycle {
                node: self.tree.node(id).name.clone(),
                source: err,
            }),
            _ => Err(MountError::Lifecycle {
                node: self.tree.node(id).name.clone(),
                source: anyhow::anyhow!("lifecycle operation produced a non-lifecycle result"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
