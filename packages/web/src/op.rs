//! Operation descriptors: classified, type-erased wrappers around the
//! functions a page registers.
//!
//! Classification happens at registration time, producing tagged
//! descriptors instead of scanning names at request time. The
//! `ComponentFn` / `DataFn` / `MiddlewareFn` / `LifecycleFn` traits are
//! implemented for plain functions and closures of arity 0..=8 over the
//! page receiver, axum-handler style: the extra marker generic keeps the
//! blanket impls coherent. Every non-receiver parameter is resolved by
//! declared type through the [`Resolver`].

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use hypertree_core::args::Resolver;
use hypertree_core::error::ResolveError;

use crate::error::DispatchError;
use crate::middleware::PageMiddleware;
use crate::node::PageNode;
use crate::page::{DataOutcome, Page, Renderable};

/// What a registered operation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Produces a [`Renderable`]; the unit of view selection.
    Component,
    /// Supplies values consumed by a component; name carries the `Data`
    /// suffix.
    Data,
    /// Returns the node's ordered middleware list; named `Middlewares`.
    Middleware,
    /// Runs once at build time; named `Init`.
    Lifecycle,
}

/// Raw result of invoking an operation, matching its [`OpKind`].
pub enum OpOutput {
    Rendered(Box<dyn Renderable>),
    Data(DataOutcome),
    Middleware(Vec<Arc<dyn PageMiddleware>>),
    Lifecycle(anyhow::Result<()>),
}

impl fmt::Debug for OpOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rendered(_) => f.write_str("Rendered"),
            Self::Data(_) => f.write_str("Data"),
            Self::Middleware(list) => f.debug_tuple("Middleware").field(&list.len()).finish(),
            Self::Lifecycle(result) => f.debug_tuple("Lifecycle").field(result).finish(),
        }
    }
}

type ErasedCall =
    Arc<dyn Fn(&PageNode, &mut Resolver<'_>) -> Result<OpOutput, DispatchError> + Send + Sync>;

/// A classified, type-erased operation bound to its owning page type.
#[derive(Clone)]
pub struct OpDescriptor {
    pub(crate) name: String,
    pub(crate) kind: OpKind,
    pub(crate) owner: TypeId,
    pub(crate) owner_name: &'static str,
    pub(crate) call: ErasedCall,
}

impl OpDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub(crate) fn component<P, F, A>(name: String, f: F) -> Self
    where
        P: Page,
        F: ComponentFn<P, A>,
    {
        Self::erased::<P, _>(name, OpKind::Component, move |page, resolver| {
            Ok(OpOutput::Rendered(f.invoke(page, resolver)?))
        })
    }

    pub(crate) fn data<P, F, A>(name: String, f: F) -> Self
    where
        P: Page,
        F: DataFn<P, A>,
    {
        Self::erased::<P, _>(name, OpKind::Data, move |page, resolver| {
            Ok(OpOutput::Data(f.invoke(page, resolver)?))
        })
    }

    pub(crate) fn middleware<P, F, A>(name: String, f: F) -> Self
    where
        P: Page,
        F: MiddlewareFn<P, A>,
    {
        Self::erased::<P, _>(name, OpKind::Middleware, move |page, resolver| {
            Ok(OpOutput::Middleware(f.invoke(page, resolver)?))
        })
    }

    pub(crate) fn lifecycle<P, F, A>(name: String, f: F) -> Self
    where
        P: Page,
        F: LifecycleFn<P, A>,
    {
        Self::erased::<P, _>(name, OpKind::Lifecycle, move |page, resolver| {
            Ok(OpOutput::Lifecycle(f.invoke(page, resolver)?))
        })
    }

    fn erased<P, G>(name: String, kind: OpKind, g: G) -> Self
    where
        P: Page,
        G: Fn(&P, &mut Resolver<'_>) -> Result<OpOutput, DispatchError> + Send + Sync + 'static,
    {
        let op_name = name.clone();
        let call: ErasedCall = Arc::new(move |node, resolver| {
            let page = node.instance.downcast_ref::<P>().ok_or_else(|| {
                DispatchError::ReceiverMismatch {
                    operation: op_name.clone(),
                    expected: std::any::type_name::<P>(),
                    found: node.page_type_name,
                }
            })?;
            g(page, resolver)
        });
        Self {
            name,
            kind,
            owner: TypeId::of::<P>(),
            owner_name: std::any::type_name::<P>(),
            call,
        }
    }
}

/// A registerable component operation: receiver plus injected parameters,
/// returning a [`Renderable`].
pub trait ComponentFn<P, A>: Send + Sync + 'static {
    fn invoke(&self, page: &P, resolver: &mut Resolver<'_>)
        -> Result<Box<dyn Renderable>, ResolveError>;
}

/// A registerable data operation, returning a [`DataOutcome`].
pub trait DataFn<P, A>: Send + Sync + 'static {
    fn invoke(&self, page: &P, resolver: &mut Resolver<'_>) -> Result<DataOutcome, ResolveError>;
}

/// A registerable middleware operation, returning the node's ordered
/// middleware list.
pub trait MiddlewareFn<P, A>: Send + Sync + 'static {
    fn invoke(
        &self,
        page: &P,
        resolver: &mut Resolver<'_>,
    ) -> Result<Vec<Arc<dyn PageMiddleware>>, ResolveError>;
}

/// A registerable lifecycle operation, run once at build time.
pub trait LifecycleFn<P, A>: Send + Sync + 'static {
    fn invoke(&self, page: &P, resolver: &mut Resolver<'_>)
        -> Result<anyhow::Result<()>, ResolveError>;
}

macro_rules! impl_op_fns {
    ($($ty:ident),*) => {
        impl<Func, P, R, $($ty,)*> ComponentFn<P, ($($ty,)*)> for Func
        where
            Func: Fn(&P, $($ty),*) -> R + Send + Sync + 'static,
            R: Renderable + 'static,
            P: Page,
            $($ty: Clone + Send + Sync + 'static,)*
        {
            #[allow(non_snake_case)]
            fn invoke(
                &self,
                page: &P,
                _resolver: &mut Resolver<'_>,
            ) -> Result<Box<dyn Renderable>, ResolveError> {
                $(let $ty = _resolver.resolve::<$ty>()?;)*
                Ok(Box::new(self(page, $($ty),*)))
            }
        }

        impl<Func, P, $($ty,)*> DataFn<P, ($($ty,)*)> for Func
        where
            Func: Fn(&P, $($ty),*) -> DataOutcome + Send + Sync + 'static,
            P: Page,
            $($ty: Clone + Send + Sync + 'static,)*
        {
            #[allow(non_snake_case)]
            fn invoke(
                &self,
                page: &P,
                _resolver: &mut Resolver<'_>,
            ) -> Result<DataOutcome, ResolveError> {
                $(let $ty = _resolver.resolve::<$ty>()?;)*
                Ok(self(page, $($ty),*))
            }
        }

        impl<Func, P, $($ty,)*> MiddlewareFn<P, ($($ty,)*)> for Func
        where
            Func: Fn(&P, $($ty),*) -> Vec<Arc<dyn PageMiddleware>> + Send + Sync + 'static,
            P: Page,
            $($ty: Clone + Send + Sync + 'static,)*
        {
            #[allow(non_snake_case)]
            fn invoke(
                &self,
                page: &P,
                _resolver: &mut Resolver<'_>,
            ) -> Result<Vec<Arc<dyn PageMiddleware>>, ResolveError> {
                $(let $ty = _resolver.resolve::<$ty>()?;)*
                Ok(self(page, $($ty),*))
            }
        }

        impl<Func, P, $($ty,)*> LifecycleFn<P, ($($ty,)*)> for Func
        where
            Func: Fn(&P, $($ty),*) -> anyhow::Result<()> + Send + Sync + 'static,
            P: Page,
            $($ty: Clone + Send + Sync + 'static,)*
        {
            #[allow(non_snake_case)]
            fn invoke(
                &self,
                page: &P,
                _resolver: &mut Resolver<'_>,
            ) -> Result<anyhow::Result<()>, ResolveError> {
                $(let $ty = _resolver.resolve::<$ty>()?;)*
                Ok(self(page, $($ty),*))
            }
        }
    };
}

impl_op_fns!();
impl_op_fns!(T1);
impl_op_fns!(T1, T2);
impl_op_fns!(T1, T2, T3);
impl_op_fns!(T1, T2, T3, T4);
impl_op_fns!(T1, T2, T3, T4, T5);
impl_op_fns!(T1, T2, T3, T4, T5, T6);
impl_op_fns!(T1, T2, T3, T4, T5, T6, T7);
impl_op_fns!(T1, T2, T3, T4, T5, T6, T7, T8);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
