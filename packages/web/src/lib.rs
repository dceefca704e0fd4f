//! Hypertree web layer — mounts a declaratively-annotated page tree onto an
//! axum router, with type-directed operation dispatch, render-target
//! selection for partial rendering, and data-operation overrides.

pub mod build;
pub mod error;
pub mod headers;
pub mod middleware;
pub mod mount;
pub mod node;
pub mod op;
pub mod page;
pub mod request;
pub mod resolve;
pub mod select;

mod dispatch;
mod handler;
mod registrar;
mod respond;

pub use build::{NodeBuilder, DATA_SUFFIX, LIFECYCLE_OP, MIDDLEWARE_OP};
pub use error::{
    DispatchError, ErrorHandler, LookupError, MountError, RequestError, SelectError,
};
pub use middleware::{Next, PageMiddleware};
pub use mount::{mount, EmptyNodeDiagnostic, MountOptions};
pub use node::{NodeId, NodeRef, PageNode, PageTree};
pub use op::{OpDescriptor, OpKind};
pub use page::{DataOutcome, OpTarget, Page, RenderFn, Renderable};
pub use request::{PathParams, RequestInfo};
pub use resolve::{RenderContext, TreeHandle, UrlArgs};
pub use select::{
    DefaultSelector, LazyCallable, NodeView, RenderTarget, RenderTargetSelector, SelectRequest,
    DEFAULT_COMPONENT,
};
