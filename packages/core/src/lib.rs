//! `hypertree` Core — route annotation grammar, dependency registry, and
//! type-directed value resolution.

pub mod args;
pub mod error;
pub mod ident;
pub mod registry;
pub mod route;

pub use args::{Resolver, ValueSet};
pub use error::{RegistryError, ResolveError, RouteError};
pub use ident::{fragment_to_component, kebab_name, type_kebab_name};
pub use registry::DependencyRegistry;
pub use route::{RouteSpec, Verb};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
