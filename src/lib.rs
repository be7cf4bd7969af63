//! Runtime enforcement of a structural type system for a dynamically-typed
//! language.
//!
//! The crate has two coupled halves. The runtime half
//! ([`runtime::TypeContext`], [`runtime::TypeRef`]) is a tree of type
//! descriptor values that can check dynamic [`runtime::value::Value`]s,
//! compare descriptors structurally, and collect errors keyed by
//! identifier paths. The compile half ([`language::transform_module`])
//! walks annotation AST nodes and rewrites a module into one that
//! constructs those descriptors and checks values at assignment,
//! parameter entry, and return.

pub mod diagnostics;
pub mod language;
pub mod runtime;

pub use language::{TransformOptions, transform_module};
pub use runtime::{Mode, TypeContext, TypeRef};

#[cfg(test)]
mod tests;
