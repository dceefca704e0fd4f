//! Method dispatch: receiver check, pool seeding, and type-directed
//! invocation of a classified operation.
//!
//! The pool handed in by the caller carries call-scoped values (a data
//! operation's results, request-scoped values). Dispatch adds the node
//! itself in both injectable forms, the typed shared instance (`Arc<P>`)
//! and the metadata handle ([`NodeRef`]), then resolves each declared
//! parameter in order: exact pool match, assignable pool match, registry.

use hypertree_core::args::{Resolver, ValueSet};
use hypertree_core::registry::DependencyRegistry;

use crate::error::DispatchError;
use crate::node::PageNode;
use crate::op::{OpDescriptor, OpOutput};

/// Invokes `op` on `node` with `pool` as the call-scoped values.
///
/// # Errors
///
/// Fails with [`DispatchError::ReceiverMismatch`] when the operation was
/// declared on a different page type than the node holds, or with a
/// missing-argument error naming the operation and the unresolvable type.
pub(crate) fn dispatch(
    node: &PageNode,
    op: &OpDescriptor,
    registry: &DependencyRegistry,
    mut pool: ValueSet,
) -> Result<OpOutput, DispatchError> {
    if op.owner != node.page_type {
        return Err(DispatchError::ReceiverMismatch {
            operation: op.name.clone(),
            expected: op.owner_name,
            found: node.page_type_name,
        });
    }
    (node.seed_pool)(&mut pool);
    pool.push(node.node_ref());
    let mut resolver = Resolver::new(&op.name, pool, registry);
    (op.call)(node, &mut resolver)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
