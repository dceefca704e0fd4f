//! Call-scoped value pool and the type-directed argument resolver.
//!
//! A [`ValueSet`] holds the values available to one dispatch: values a
//! data operation returned, request-scoped values, and the node itself.
//! Entries are ordered and may repeat; each resolution consumes the first
//! unused matching entry so two parameters of the same type receive two
//! distinct values in declaration order.
//!
//! The [`Resolver`] implements the resolution order for one declared
//! parameter: exact pool match, assignable pool match, then the
//! [`DependencyRegistry`] (itself exact-first).

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::ResolveError;
use crate::registry::DependencyRegistry;

struct Entry {
    id: TypeId,
    assignable: bool,
    used: bool,
    produce: Arc<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>,
}

/// Ordered pool of call-scoped values, keyed by exact declared type.
#[derive(Default)]
pub struct ValueSet {
    entries: Vec<Entry>,
}

impl ValueSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value matched by its exact type. Repeats are allowed; each
    /// is consumed once, in insertion order.
    pub fn push<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.entries.push(Entry {
            id: TypeId::of::<T>(),
            assignable: false,
            used: false,
            produce: Arc::new(move || Box::new(value.clone())),
        });
    }

    /// Adds a value matched only after every exact candidate for the
    /// requested type is exhausted.
    pub fn push_assignable<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.entries.push(Entry {
            id: TypeId::of::<T>(),
            assignable: true,
            used: false,
            produce: Arc::new(move || Box::new(value.clone())),
        });
    }

    /// Appends all entries of `other`, preserving their order and
    /// used/assignable state.
    pub fn extend(&mut self, other: ValueSet) {
        self.entries.extend(other.entries);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn take(&mut self, id: TypeId, assignable: bool) -> Option<Box<dyn Any + Send + Sync>> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| !e.used && e.assignable == assignable && e.id == id)?;
        entry.used = true;
        Some((entry.produce)())
    }
}

/// Converts a value, tuple of values, or unit into a [`ValueSet`].
///
/// This is how data operations hand their results to the component that
/// consumes them: each tuple element becomes one exact-typed pool entry.
pub trait IntoValueSet {
    fn into_value_set(self) -> ValueSet;
}

impl IntoValueSet for ValueSet {
    fn into_value_set(self) -> ValueSet {
        self
    }
}

impl IntoValueSet for () {
    fn into_value_set(self) -> ValueSet {
        ValueSet::new()
    }
}

macro_rules! impl_into_value_set {
    ($($name:ident),+) => {
        impl<$($name: Clone + Send + Sync + 'static),+> IntoValueSet for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_value_set(self) -> ValueSet {
                let ($($name,)+) = self;
                let mut set = ValueSet::new();
                $(set.push($name);)+
                set
            }
        }
    };
}

impl_into_value_set!(T1);
impl_into_value_set!(T1, T2);
impl_into_value_set!(T1, T2, T3);
impl_into_value_set!(T1, T2, T3, T4);
impl_into_value_set!(T1, T2, T3, T4, T5);
impl_into_value_set!(T1, T2, T3, T4, T5, T6);
impl_into_value_set!(T1, T2, T3, T4, T5, T6, T7);
impl_into_value_set!(T1, T2, T3, T4, T5, T6, T7, T8);

/// Resolves declared parameter types against a pool and the registry.
///
/// Resolution is strictly type-directed; parameter order only matters
/// when two parameters declare the same type, in which case pool entries
/// are consumed in insertion order.
pub struct Resolver<'a> {
    operation: &'a str,
    pool: ValueSet,
    registry: &'a DependencyRegistry,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(operation: &'a str, pool: ValueSet, registry: &'a DependencyRegistry) -> Self {
        Self {
            operation,
            pool,
            registry,
        }
    }

    /// Resolves one declared parameter of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingArgument`] naming the operation and
    /// the type when no source can supply a `T`.
    pub fn resolve<T: Clone + Send + Sync + 'static>(&mut self) -> Result<T, ResolveError> {
        let id = TypeId::of::<T>();
        let boxed = self
            .pool
            .take(id, false)
            .or_else(|| self.pool.take(id, true))
            .or_else(|| self.registry.get_erased(id))
            .ok_or_else(|| ResolveError::MissingArgument {
                operation: self.operation.to_string(),
                ty: std::any::type_name::<T>(),
            })?;
        // The entry was stored under TypeId::of::<T>(), so this downcast
        // cannot fail.
        Ok(*boxed
            .downcast::<T>()
            .unwrap_or_else(|_| unreachable!("pool entry stored under wrong TypeId")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Marker(u64);

    fn resolver<'a>(pool: ValueSet, registry: &'a DependencyRegistry) -> Resolver<'a> {
        Resolver::new("Test", pool, registry)
    }

    #[test]
    fn pool_exact_beats_registry() {
        let mut reg = DependencyRegistry::new();
        reg.insert(Marker(1)).unwrap();
        let mut pool = ValueSet::new();
        pool.push(Marker(2));

        let mut r = resolver(pool, &reg);
        assert_eq!(r.resolve::<Marker>().unwrap(), Marker(2));
    }

    #[test]
    fn pool_exact_beats_pool_assignable() {
        let reg = DependencyRegistry::new();
        let mut pool = ValueSet::new();
        pool.push_assignable(Marker(9));
        pool.push(Marker(1));

        let mut r = resolver(pool, &reg);
        // Exact tier wins even though the assignable entry was added first.
        assert_eq!(r.resolve::<Marker>().unwrap(), Marker(1));
        assert_eq!(r.resolve::<Marker>().unwrap(), Marker(9));
    }

    #[test]
    fn repeated_types_consumed_in_insertion_order() {
        let reg = DependencyRegistry::new();
        let mut pool = ValueSet::new();
        pool.push("first".to_string());
        pool.push("second".to_string());

        let mut r = resolver(pool, &reg);
        assert_eq!(r.resolve::<String>().unwrap(), "first");
        assert_eq!(r.resolve::<String>().unwrap(), "second");
        assert!(r.resolve::<String>().is_err());
    }

    #[test]
    fn registry_fallback_after_pool_exhausted() {
        let mut reg = DependencyRegistry::new();
        reg.insert(Marker(7)).unwrap();
        let mut pool = ValueSet::new();
        pool.push(Marker(1));

        let mut r = resolver(pool, &reg);
        assert_eq!(r.resolve::<Marker>().unwrap(), Marker(1));
        // Pool is spent; the registry supplies every further request.
        assert_eq!(r.resolve::<Marker>().unwrap(), Marker(7));
        assert_eq!(r.resolve::<Marker>().unwrap(), Marker(7));
    }

    #[test]
    fn missing_argument_names_operation_and_type() {
        let reg = DependencyRegistry::new();
        let mut r = Resolver::new("Stats", ValueSet::new(), &reg);
        let err = r.resolve::<Marker>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Stats"), "{msg}");
        assert!(msg.contains("Marker"), "{msg}");
    }

    #[test]
    fn tuple_into_value_set() {
        let set = (Marker(1), "x".to_string()).into_value_set();
        assert_eq!(set.len(), 2);
    }
}
