//! User-facing page model: the `Page` trait, the `Renderable` capability,
//! and the tagged result type data operations return.

use std::any::TypeId;
use std::io::Write;

use axum::response::{IntoResponse, Response};
use hypertree_core::args::{IntoValueSet, ValueSet};

use crate::build::NodeBuilder;
use crate::resolve::RenderContext;

/// A node in the page tree.
///
/// A page declares its operations and children once, at mount time, in
/// `configure`. The instance handed to `configure` is the one the tree
/// owns for the lifetime of the mount; it is shared across all concurrent
/// requests to the node, so any mutable state it caches must bring its own
/// synchronization.
pub trait Page: Send + Sync + 'static {
    fn configure(&self, node: &mut NodeBuilder<Self>)
    where
        Self: Sized;
}

/// Something a component operation can return: renders itself into a
/// writer given the request's render context.
///
/// The template engine lives behind this trait; the framework never sees
/// more of it than these two arguments.
pub trait Renderable: Send {
    /// Writes the rendered output.
    ///
    /// # Errors
    ///
    /// Any failure aborts the response; because output is staged in a
    /// buffer, a late failure still produces a clean error response.
    fn render(&self, ctx: &RenderContext, out: &mut dyn Write) -> anyhow::Result<()>;
}

impl Renderable for String {
    fn render(&self, _ctx: &RenderContext, out: &mut dyn Write) -> anyhow::Result<()> {
        out.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl Renderable for &'static str {
    fn render(&self, _ctx: &RenderContext, out: &mut dyn Write) -> anyhow::Result<()> {
        out.write_all(self.as_bytes())?;
        Ok(())
    }
}

/// Adapts a closure into a [`Renderable`], for views that need the
/// render context without defining a type.
pub struct RenderFn<F>(pub F);

impl<F> Renderable for RenderFn<F>
where
    F: Fn(&RenderContext, &mut dyn Write) -> anyhow::Result<()> + Send,
{
    fn render(&self, ctx: &RenderContext, out: &mut dyn Write) -> anyhow::Result<()> {
        (self.0)(ctx, out)
    }
}

/// Names a component operation by its owning page type, for cross-node
/// redirects.
#[derive(Debug, Clone)]
pub struct OpTarget {
    pub(crate) page_type: TypeId,
    pub(crate) page_type_name: &'static str,
    pub(crate) operation: String,
}

impl OpTarget {
    /// Targets `operation` on the node whose instance is of type `P`.
    #[must_use]
    pub fn of<P: Page>(operation: &str) -> Self {
        Self {
            page_type: TypeId::of::<P>(),
            page_type_name: std::any::type_name::<P>(),
            operation: operation.to_string(),
        }
    }

    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

/// Tagged result of a data operation.
///
/// `Values` feeds the selected component. `Redirect` re-targets rendering
/// to another component, possibly on another node; its values are used
/// verbatim as that component's call-scoped pool. `Skip` means the
/// operation already produced the full response. `Failure` goes to the
/// configured error handler.
pub enum DataOutcome {
    Values(ValueSet),
    Redirect { target: OpTarget, values: ValueSet },
    Skip(Response),
    Failure(anyhow::Error),
}

impl DataOutcome {
    /// Values for the selected component; accepts a single value, a tuple,
    /// or a prebuilt [`ValueSet`].
    #[must_use]
    pub fn values(values: impl IntoValueSet) -> Self {
        Self::Values(values.into_value_set())
    }

    /// An empty value set; the component resolves everything from the
    /// request scope and the registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::Values(ValueSet::new())
    }

    /// Redirects rendering to `operation` on the node of type `P`, with
    /// no call-scoped values.
    #[must_use]
    pub fn redirect<P: Page>(operation: &str) -> Self {
        Self::Redirect {
            target: OpTarget::of::<P>(operation),
            values: ValueSet::new(),
        }
    }

    /// Redirects rendering to `operation` on the node of type `P` with
    /// explicit replacement values, used verbatim.
    #[must_use]
    pub fn redirect_with<P: Page>(operation: &str, values: impl IntoValueSet) -> Self {
        Self::Redirect {
            target: OpTarget::of::<P>(operation),
            values: values.into_value_set(),
        }
    }

    /// Converts a `Values` outcome into a redirect that reuses those same
    /// values. Other variants are returned unchanged.
    #[must_use]
    pub fn redirect_to(self, target: OpTarget) -> Self {
        match self {
            Self::Values(values) => Self::Redirect { target, values },
            other => other,
        }
    }

    /// The operation already wrote its own response; rendering is skipped.
    #[must_use]
    pub fn skip(response: impl IntoResponse) -> Self {
        Self::Skip(response.into_response())
    }

    /// Surfaces an error to the configured error handler.
    #[must_use]
    pub fn fail(err: impl Into<anyhow::Error>) -> Self {
        Self::Failure(err.into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
