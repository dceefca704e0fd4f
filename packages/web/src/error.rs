//! Error taxonomy: build-time errors abort the mount; per-request errors
//! are recovered at the request boundary and handed to the configured
//! error handler.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use hypertree_core::{RegistryError, ResolveError, RouteError};
use thiserror::Error;

use crate::request::RequestInfo;

/// Structural errors raised while building or registering a tree. Fatal:
/// the mount aborts and nothing is registered.
#[derive(Debug, Error)]
pub enum MountError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("node {node}: duplicate operation {name}")]
    DuplicateOperation { node: String, name: String },
    #[error("node {node}: data operation {name} must carry the Data suffix")]
    DataSuffix { node: String, name: String },
    #[error("node {node}: {name} is reserved and cannot name a component")]
    ReservedName { node: String, name: String },
    #[error("node {node}: lifecycle operation failed: {source}")]
    Lifecycle {
        node: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("node {node}: middleware operation failed: {source}")]
    Middleware {
        node: String,
        #[source]
        source: DispatchError,
    },
}

/// Errors from one dispatch: receiver adaptation or argument resolution.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("operation {operation}: receiver mismatch: declared on {expected}, node holds {found}")]
    ReceiverMismatch {
        operation: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    Missing(#[from] ResolveError),
}

/// Errors a pluggable selector can raise.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error("selector failed: {0}")]
    Failed(#[from] anyhow::Error),
}

/// Per-request errors, recovered at the request boundary.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error("node {node} has no component {name}")]
    UnknownTarget { node: String, name: String },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("cannot find node for operation {operation}")]
    NodeForOperation { operation: String },
    #[error("data operation {operation} failed: {source}")]
    Data {
        operation: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("render failed: {source}")]
    Render {
        #[source]
        source: anyhow::Error,
    },
    #[error("operation {operation} produced an unexpected result kind")]
    UnexpectedOutput { operation: String },
}

/// Errors from the lookup resolver and URL/ID generation.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no node found for {query}")]
    NotFound { query: String },
    #[error("node reference {name} is ambiguous across multiple nodes")]
    Ambiguous { name: String },
    #[error("node {node} has no operation {operation}")]
    OperationMissing { node: String, operation: String },
    #[error("url for {route}: no value for placeholder {name}")]
    MissingPlaceholder { route: String, name: String },
}

/// Turns a failed request into a response. The request boundary hands
/// every recovered error here; nothing retries.
pub type ErrorHandler = Arc<dyn Fn(&RequestInfo, &RequestError) -> Response + Send + Sync>;

/// Default error handler: a generic 500 with no detail in the body.
pub(crate) fn default_error_handler(_info: &RequestInfo, err: &RequestError) -> Response {
    tracing::error!(error = %err, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
