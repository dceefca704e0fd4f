//! Route registration: walks a built tree and installs one handler per
//! routable node on an axum [`Router`].
//!
//! Middleware is resolved here, once per node at registration time: a
//! node's `Middlewares` operation is dispatched and its list appended to
//! the inherited ancestor chain, so every request to the node (and to its
//! descendants) runs ancestors first. A node with no components gets no
//! route; when it has no children either, the mount's empty-node
//! diagnostic fires for it.

use std::sync::Arc;

use axum::extract::{RawPathParams, Request};
use axum::routing::{self, MethodRouter};
use axum::Router;
use hypertree_core::args::ValueSet;
use hypertree_core::route::Verb;
use tracing::info;

use crate::dispatch::dispatch;
use crate::error::{ErrorHandler, MountError};
use crate::handler::{handle_request, NodeHandlerState};
use crate::middleware::PageMiddleware;
use crate::mount::EmptyNodeDiagnostic;
use crate::node::NodeId;
use crate::op::OpOutput;
use crate::resolve::TreeHandle;
use crate::respond::BufferPool;
use crate::select::RenderTargetSelector;

/// Mount-wide pieces shared by every node handler.
pub(crate) struct RegistrarConfig {
    pub(crate) selector: Arc<dyn RenderTargetSelector>,
    pub(crate) error_handler: ErrorHandler,
    pub(crate) buffers: Arc<BufferPool>,
    pub(crate) on_empty_node: EmptyNodeDiagnostic,
}

/// Registers every routable node of the tree, children before parents.
pub(crate) fn register(
    router: Router,
    handle: &TreeHandle,
    config: &RegistrarConfig,
    base_chain: Vec<Arc<dyn PageMiddleware>>,
) -> Result<Router, MountError> {
    register_node(router, handle, config, handle.tree.root().id, base_chain)
}

fn register_node(
    mut router: Router,
    handle: &TreeHandle,
    config: &RegistrarConfig,
    id: NodeId,
    inherited: Vec<Arc<dyn PageMiddleware>>,
) -> Result<Router, MountError> {
    let node = handle.tree.node(id);

    let mut chain = inherited;
    if let Some(op) = node.middleware_op.clone() {
        let out = dispatch(node, &op, &handle.registry, ValueSet::new()).map_err(|source| {
            MountError::Middleware {
                node: node.name().to_string(),
                source,
            }
        })?;
        // Descriptors classified as middleware only ever produce a
        // middleware list.
        if let OpOutput::Middleware(list) = out {
            chain.extend(list);
        }
    }

    for child in node.children.clone() {
        router = register_node(router, handle, config, child, chain.clone())?;
    }

    if node.components.is_empty() {
        if node.children.is_empty() {
            (config.on_empty_node)(&node.node_ref());
        }
    } else {
        let state = NodeHandlerState {
            handle: handle.clone(),
            node: id,
            selector: Arc::clone(&config.selector),
            error_handler: Arc::clone(&config.error_handler),
            buffers: Arc::clone(&config.buffers),
            chain: chain.clone(),
        };
        info!(
            route = node.full_route(),
            verb = node.route().verb.as_str(),
            node = node.name(),
            middlewares = chain.len(),
            "route registered"
        );
        router = router.route(node.full_route(), method_router(node.route().verb, state));
    }
    Ok(router)
}

fn method_router(verb: Verb, state: NodeHandlerState) -> MethodRouter {
    let handler = move |params: RawPathParams, request: Request| {
        handle_request(state.clone(), params, request)
    };
    match verb {
        Verb::Get => routing::get(handler),
        Verb::Head => routing::head(handler),
        Verb::Post => routing::post(handler),
        Verb::Put => routing::put(handler),
        Verb::Patch => routing::patch(handler),
        Verb::Delete => routing::delete(handler),
        Verb::Connect => routing::connect(handler),
        Verb::Options => routing::options(handler),
        Verb::Trace => routing::trace(handler),
        Verb::All => routing::any(handler),
    }
}
