//! The per-node request handler: select, fetch, render, respond.
//!
//! Every registered route runs the same pipeline. The selector picks a
//! render target from the convention headers; the target's paired data
//! operation (if declared) runs first and its result steers the rest,
//! either feeding the component, overriding the target, skipping
//! rendering entirely, or failing; the component renders into a pooled
//! buffer; the buffer becomes the response. Any recovered error goes to
//! the configured error handler instead.

use std::sync::Arc;

use axum::extract::{RawPathParams, Request};
use axum::response::{IntoResponse, Response};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hypertree_core::args::ValueSet;
use hypertree_core::ident::fragment_to_component;
use tracing::debug;

use crate::build::DATA_SUFFIX;
use crate::dispatch::dispatch;
use crate::error::{ErrorHandler, RequestError};
use crate::headers;
use crate::middleware::{BoxFuture, Next, PageMiddleware};
use crate::node::{NodeId, PageNode};
use crate::op::OpOutput;
use crate::page::DataOutcome;
use crate::request::{PathParams, RequestInfo};
use crate::resolve::{RenderContext, TreeHandle};
use crate::respond::BufferPool;
use crate::select::{
    NodeView, RenderTarget, RenderTargetSelector, SelectRequest, DEFAULT_COMPONENT,
};

/// Everything one node's handler closure needs, cloned per registration.
#[derive(Clone)]
pub(crate) struct NodeHandlerState {
    pub(crate) handle: TreeHandle,
    pub(crate) node: NodeId,
    pub(crate) selector: Arc<dyn RenderTargetSelector>,
    pub(crate) error_handler: ErrorHandler,
    pub(crate) buffers: Arc<BufferPool>,
    /// Inherited ancestor middleware followed by the node's own, in
    /// declaration order (first declared runs outermost).
    pub(crate) chain: Vec<Arc<dyn PageMiddleware>>,
}

/// Pipeline stages, logged as the request moves through them.
#[derive(Debug, Clone, Copy)]
enum RequestPhase {
    TargetSelected,
    DataOperationRun,
    OverrideResolved,
    ResponseSkipped,
    Rendered,
    Failed,
}

fn trace_phase(phase: RequestPhase) {
    debug!(?phase, "request phase");
}

/// Entry point for every registered route: wraps the render pipeline in
/// the node's middleware chain.
pub(crate) async fn handle_request(
    state: NodeHandlerState,
    raw_params: RawPathParams,
    request: Request,
) -> Response {
    let params = PathParams::from_raw(&raw_params);
    let chain = state.chain.clone();
    let endpoint = Arc::new(move |req: Request| -> BoxFuture<Response> {
        let state = state.clone();
        let params = params.clone();
        Box::pin(async move { render_pipeline(&state, &params, &req) })
    });
    Next::new(chain, endpoint).run(request).await
}

fn render_pipeline(state: &NodeHandlerState, params: &PathParams, req: &Request) -> Response {
    let info = RequestInfo::from_request(req);
    let select_req = SelectRequest::from_headers(req.headers());
    match run(state, params, &info, &select_req) {
        Ok(response) => response,
        Err(err) => {
            trace_phase(RequestPhase::Failed);
            (state.error_handler)(&info, &err)
        }
    }
}

fn run(
    state: &NodeHandlerState,
    params: &PathParams,
    info: &RequestInfo,
    select_req: &SelectRequest,
) -> Result<Response, RequestError> {
    let tree = &state.handle.tree;
    let node = tree.node(state.node);

    let target = state
        .selector
        .select(select_req, &NodeView::new(node))?;
    trace_phase(RequestPhase::TargetSelected);

    let component = match &target {
        RenderTarget::Callable(callable)
            if callable.matches(select_req.fragment.as_deref(), node.name()) =>
        {
            let ctx = context(state, state.node, params, select_req);
            let mut buf = state.buffers.acquire();
            (callable.call)(&ctx, &mut buf)
                .map_err(|source| RequestError::Render { source })?;
            trace_phase(RequestPhase::Rendered);
            return Ok(html_response(buf.to_bytes(), false));
        }
        // An unmatched callable falls back to the default component.
        RenderTarget::Callable(_) => DEFAULT_COMPONENT.to_string(),
        RenderTarget::Component { name } => name.clone(),
    };
    if node.component(&component).is_none() {
        return Err(RequestError::UnknownTarget {
            node: node.name().to_string(),
            name: component,
        });
    }

    // The paired data operation, when declared, runs first and steers
    // everything after it.
    let mut render_node = node;
    let mut render_component = component.clone();
    let mut pool = ValueSet::new();
    if let Some(op) = node.data_op(&format!("{component}{DATA_SUFFIX}")) {
        let outcome = dispatch(node, op, &state.handle.registry, scope(state, params, info, select_req, &component))?;
        trace_phase(RequestPhase::DataOperationRun);
        let OpOutput::Data(outcome) = outcome else {
            return Err(RequestError::UnexpectedOutput {
                operation: op.name().to_string(),
            });
        };
        match outcome {
            DataOutcome::Values(values) => pool = values,
            DataOutcome::Skip(response) => {
                trace_phase(RequestPhase::ResponseSkipped);
                return Ok(response);
            }
            DataOutcome::Failure(source) => {
                return Err(RequestError::Data {
                    operation: op.name().to_string(),
                    source,
                });
            }
            DataOutcome::Redirect { target, values } => {
                let id = tree.node_for_type(target.page_type).ok_or_else(|| {
                    RequestError::NodeForOperation {
                        operation: format!("{}.{}", target.page_type_name, target.operation),
                    }
                })?;
                render_node = tree.node(id);
                render_component = target.operation;
                if render_node.component(&render_component).is_none() {
                    return Err(RequestError::UnknownTarget {
                        node: render_node.name().to_string(),
                        name: render_component,
                    });
                }
                pool = values;
                trace_phase(RequestPhase::OverrideResolved);
            }
        }
    }

    pool.extend(scope(state, params, info, select_req, &render_component));
    let op = component_op(render_node, &render_component)?;
    let rendered = dispatch(render_node, op, &state.handle.registry, pool)?;
    let OpOutput::Rendered(renderable) = rendered else {
        return Err(RequestError::UnexpectedOutput {
            operation: render_component,
        });
    };

    let ctx = context(state, render_node.id, params, select_req);
    let mut buf = state.buffers.acquire();
    renderable
        .render(&ctx, &mut buf)
        .map_err(|source| RequestError::Render { source })?;
    trace_phase(RequestPhase::Rendered);

    // A partial request that asked for a fragment but fell back to the
    // full page tells the client to swap the whole body instead.
    let retarget = select_req.partial
        && render_component == DEFAULT_COMPONENT
        && select_req
            .fragment
            .as_deref()
            .is_some_and(|f| fragment_to_component(f).as_deref() != Some(DEFAULT_COMPONENT));
    Ok(html_response(buf.to_bytes(), retarget))
}

/// Request-scoped injectables: fresh clones per dispatch.
fn scope(
    state: &NodeHandlerState,
    params: &PathParams,
    info: &RequestInfo,
    select_req: &SelectRequest,
    component: &str,
) -> ValueSet {
    let mut pool = ValueSet::new();
    pool.push(state.handle.clone());
    pool.push(params.clone());
    pool.push(info.clone());
    pool.push(select_req.clone());
    pool.push(RenderTarget::component(component));
    pool
}

fn component_op<'a>(
    node: &'a PageNode,
    name: &str,
) -> Result<&'a crate::op::OpDescriptor, RequestError> {
    node.component(name).ok_or_else(|| RequestError::UnknownTarget {
        node: node.name().to_string(),
        name: name.to_string(),
    })
}

fn context(
    state: &NodeHandlerState,
    node: NodeId,
    params: &PathParams,
    select_req: &SelectRequest,
) -> RenderContext {
    RenderContext {
        handle: state.handle.clone(),
        node,
        params: params.clone(),
        fragment: select_req.fragment.clone(),
    }
}

fn html_response(body: bytes::Bytes, retarget: bool) -> Response {
    let mut response = (
        [(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
        body,
    )
        .into_response();
    if retarget {
        response.headers_mut().insert(
            HeaderName::from_static(headers::RETARGET),
            HeaderValue::from_static(headers::RETARGET_BODY),
        );
    }
    response
}
