//! Process-wide dependency registry: a type-to-instance map used as the
//! fallback source for type-directed argument resolution.
//!
//! The registry is populated once while a tree is built and treated as
//! read-only afterwards. Values are stored by `TypeId` in two tiers:
//! primary entries matched exactly, and assignable entries consulted only
//! when no primary entry exists for the requested type. Registering two
//! primary values of the identical type is an error, never a silent
//! overwrite.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::debug;

use crate::error::RegistryError;

/// A stored value plus the means to hand out an owned copy of it.
#[derive(Clone)]
struct Entry {
    ty: &'static str,
    produce: Arc<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>,
}

impl Entry {
    fn new<T: Clone + Send + Sync + 'static>(value: T) -> Self {
        Self {
            ty: std::any::type_name::<T>(),
            produce: Arc::new(move || Box::new(value.clone())),
        }
    }

    fn take<T: 'static>(&self) -> Option<T> {
        (self.produce)().downcast::<T>().ok().map(|b| *b)
    }
}

/// Type-keyed instance map with exact-first, assignable-fallback lookup.
#[derive(Default)]
pub struct DependencyRegistry {
    primary: AHashMap<TypeId, Entry>,
    assignable: AHashMap<TypeId, Entry>,
}

impl DependencyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a primary value for its exact type.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when a primary value of the
    /// same type is already registered.
    pub fn insert<T: Clone + Send + Sync + 'static>(
        &mut self,
        value: T,
    ) -> Result<(), RegistryError> {
        let entry = Entry::new(value);
        if self.primary.contains_key(&TypeId::of::<T>()) {
            return Err(RegistryError::Duplicate { ty: entry.ty });
        }
        debug!(ty = entry.ty, "registered primary value");
        self.primary.insert(TypeId::of::<T>(), entry);
        Ok(())
    }

    /// Registers an assignable fallback value, typically an interface form
    /// of an already-registered concrete value (for example an
    /// `Arc<dyn Trait>` coercion). Fallback entries are only consulted
    /// when no primary entry matches the requested type exactly.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AliasCollision`] when a fallback value of
    /// the same type is already registered.
    pub fn insert_assignable<T: Clone + Send + Sync + 'static>(
        &mut self,
        value: T,
    ) -> Result<(), RegistryError> {
        let entry = Entry::new(value);
        if self.assignable.contains_key(&TypeId::of::<T>()) {
            return Err(RegistryError::AliasCollision { ty: entry.ty });
        }
        debug!(ty = entry.ty, "registered assignable fallback");
        self.assignable.insert(TypeId::of::<T>(), entry);
        Ok(())
    }

    /// Looks up a value by type: exact primary match first, assignable
    /// fallback second. Returns an owned copy.
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.entry_for(TypeId::of::<T>())
            .and_then(Entry::take::<T>)
    }

    /// True when either tier holds a value for `T`.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.entry_for(TypeId::of::<T>()).is_some()
    }

    fn entry_for(&self, id: TypeId) -> Option<&Entry> {
        self.primary.get(&id).or_else(|| self.assignable.get(&id))
    }

    /// Untyped lookup used by the resolver; returns a boxed owned copy.
    #[must_use]
    pub(crate) fn get_erased(&self, id: TypeId) -> Option<Box<dyn Any + Send + Sync>> {
        self.entry_for(id).map(|entry| (entry.produce)())
    }
}

impl fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRegistry")
            .field("primary", &self.primary.len())
            .field("assignable", &self.assignable.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct ApiKey(String);

    #[derive(Debug, Clone, PartialEq)]
    struct DbName(String);

    #[test]
    fn debug_reports_tier_sizes_not_contents() {
        let mut reg = DependencyRegistry::new();
        reg.insert(ApiKey("secret".into())).unwrap();
        let printed = format!("{reg:?}");
        assert!(printed.contains("primary: 1"), "{printed}");
        assert!(!printed.contains("secret"), "{printed}");
    }

    #[test]
    fn insert_and_get_exact() {
        let mut reg = DependencyRegistry::new();
        reg.insert(ApiKey("k".into())).unwrap();
        assert_eq!(reg.get::<ApiKey>(), Some(ApiKey("k".into())));
        assert_eq!(reg.get::<DbName>(), None);
    }

    #[test]
    fn duplicate_primary_type_fails() {
        let mut reg = DependencyRegistry::new();
        reg.insert("first".to_string()).unwrap();
        let err = reg.insert("second".to_string()).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
        // The original value survives.
        assert_eq!(reg.get::<String>(), Some("first".to_string()));
    }

    #[test]
    fn distinct_newtypes_over_same_underlying_type_succeed() {
        let mut reg = DependencyRegistry::new();
        reg.insert(ApiKey("k".into())).unwrap();
        reg.insert(DbName("db".into())).unwrap();
        assert_eq!(reg.get::<ApiKey>(), Some(ApiKey("k".into())));
        assert_eq!(reg.get::<DbName>(), Some(DbName("db".into())));
    }

    #[test]
    fn exact_beats_assignable() {
        let mut reg = DependencyRegistry::new();
        reg.insert_assignable(7_u32).unwrap();
        reg.insert(42_u32).unwrap();
        assert_eq!(reg.get::<u32>(), Some(42));
    }

    #[test]
    fn assignable_fallback_used_when_no_primary() {
        let mut reg = DependencyRegistry::new();
        reg.insert_assignable(7_u32).unwrap();
        assert_eq!(reg.get::<u32>(), Some(7));
    }

    #[test]
    fn duplicate_assignable_fails() {
        let mut reg = DependencyRegistry::new();
        reg.insert_assignable(1_u8).unwrap();
        let err = reg.insert_assignable(2_u8).unwrap_err();
        assert!(matches!(err, RegistryError::AliasCollision { .. }));
    }
}
