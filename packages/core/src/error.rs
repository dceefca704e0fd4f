//! Error types shared across the core primitives.

use thiserror::Error;

/// Errors from parsing a route annotation.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("bad route annotation {annotation:?}: path {path:?} must start with '/'")]
    BadPath { annotation: String, path: String },
}

/// Errors from building the dependency registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate registry value for type {ty}")]
    Duplicate { ty: &'static str },
    #[error("assignable value for type {ty} collides with an existing entry")]
    AliasCollision { ty: &'static str },
}

/// Errors from type-directed argument resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("operation {operation}: no value of type {ty} available")]
    MissingArgument {
        operation: String,
        ty: &'static str,
    },
}
