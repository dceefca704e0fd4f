//! Mounting: builds the tree from a root page, seeds the registry, and
//! registers every routable node on an axum [`Router`].

use std::sync::Arc;

use axum::response::Response;
use axum::Router;
use hypertree_core::error::RegistryError;
use hypertree_core::registry::DependencyRegistry;
use tracing::warn;

use crate::build::TreeBuilder;
use crate::error::{default_error_handler, ErrorHandler, MountError, RequestError};
use crate::middleware::PageMiddleware;
use crate::node::NodeRef;
use crate::page::Page;
use crate::registrar::{register, RegistrarConfig};
use crate::request::RequestInfo;
use crate::resolve::TreeHandle;
use crate::respond::BufferPool;
use crate::select::{DefaultSelector, RenderTargetSelector};

/// Called once at mount time for each leaf node that declares no
/// components. Such a node gets no route.
pub type EmptyNodeDiagnostic = Arc<dyn Fn(&NodeRef) + Send + Sync>;

type Seed = Box<dyn FnOnce(&mut DependencyRegistry) -> Result<(), RegistryError>>;

/// Mount-time configuration: registry seeds, mount-wide middleware, and
/// the pluggable selection and error policies.
pub struct MountOptions {
    middlewares: Vec<Arc<dyn PageMiddleware>>,
    error_handler: ErrorHandler,
    selector: Arc<dyn RenderTargetSelector>,
    on_empty_node: EmptyNodeDiagnostic,
    seeds: Vec<Seed>,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            middlewares: Vec::new(),
            error_handler: Arc::new(default_error_handler),
            selector: Arc::new(DefaultSelector),
            on_empty_node: Arc::new(|node: &NodeRef| {
                warn!(node = %node.name, route = %node.route, "node declares no components and gets no route");
            }),
            seeds: Vec::new(),
        }
    }
}

impl MountOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the registry with a shared value, injectable by its exact
    /// type into any operation. Duplicate types across seeds (and node
    /// instances) fail the mount.
    #[must_use]
    pub fn provide<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.seeds
            .push(Box::new(move |registry| registry.insert(value)));
        self
    }

    /// Seeds the registry's assignable tier: the value loses to an exact
    /// match for the same type but answers lookups nothing else satisfies.
    #[must_use]
    pub fn provide_assignable<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.seeds
            .push(Box::new(move |registry| registry.insert_assignable(value)));
        self
    }

    /// Appends a mount-wide middleware, outermost-first ahead of every
    /// node's own chain.
    #[must_use]
    pub fn with_middleware(mut self, middleware: impl PageMiddleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Replaces the error handler applied to recovered request errors.
    #[must_use]
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RequestInfo, &RequestError) -> Response + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Replaces the render-target selection policy.
    #[must_use]
    pub fn with_selector(mut self, selector: impl RenderTargetSelector + 'static) -> Self {
        self.selector = Arc::new(selector);
        self
    }

    /// Replaces the empty-node diagnostic.
    #[must_use]
    pub fn on_empty_node<F>(mut self, diagnostic: F) -> Self
    where
        F: Fn(&NodeRef) + Send + Sync + 'static,
    {
        self.on_empty_node = Arc::new(diagnostic);
        self
    }
}

/// Builds the page tree rooted at `root`, mounts it at `base_path`, and
/// returns the extended router with a [`TreeHandle`] into what was built.
///
/// `title` is the root's fallback title when its annotation has none.
///
/// # Errors
///
/// Fails on any structural error: a bad route annotation, a duplicate
/// registry type, a misnamed or duplicate operation, or a lifecycle or
/// middleware operation failure. Nothing is registered on failure.
pub fn mount<R: Page>(
    router: Router,
    root: R,
    base_path: &str,
    title: &str,
    options: MountOptions,
) -> Result<(Router, TreeHandle), MountError> {
    let mut registry = DependencyRegistry::new();
    for seed in options.seeds {
        seed(&mut registry)?;
    }

    let (tree, registry) = TreeBuilder::build(base_path, root, title, registry)?;
    let handle = TreeHandle::new(Arc::new(tree), Arc::new(registry));

    let config = RegistrarConfig {
        selector: options.selector,
        error_handler: options.error_handler,
        buffers: Arc::new(BufferPool::new()),
        on_empty_node: options.on_empty_node,
    };
    let router = register(router, &handle, &config, options.middlewares)?;
    Ok((router, handle))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::NodeBuilder;
    use crate::error::MountError;

    #[derive(Default)]
    struct Home;

    impl Page for Home {
        fn configure(&self, node: &mut NodeBuilder<Self>) {
            node.component("Page", |_: &Home| "home".to_string());
        }
    }

    #[test]
    fn mount_returns_a_usable_handle() {
        let (_, handle) =
            mount(Router::new(), Home::default(), "/", "Home", MountOptions::new()).unwrap();
        assert_eq!(handle.find("home").unwrap().route, "/");
    }

    #[test]
    fn duplicate_seed_type_fails_the_mount() {
        let options = MountOptions::new()
            .provide("first".to_string())
            .provide("second".to_string());
        let err = mount(Router::new(), Home::default(), "/", "", options).unwrap_err();
        assert!(matches!(err, MountError::Registry(_)));
    }
}
