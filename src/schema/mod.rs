//! # Schema Model
//!
//! Immutable declarations of node and relationship types. Schemas carry no
//! behavior beyond structural accessors; the query compilers in
//! [`crate::querybuilder`] and [`crate::index`] consume them.

pub mod property_ref;
pub mod node;
pub mod relationship;

pub use property_ref::{PropertyRef, RefMap, MatchMode, ValueSource};
pub use node::{NodeSchema, NodeSchemaBuilder};
pub use relationship::{RelSchema, RelSchemaBuilder, LinkDirection};

/// Provenance stamped on every node and relationship a schema writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into() }
    }
}

impl Default for ModuleInfo {
    fn default() -> Self {
        Self::new("cartography", env!("CARGO_PKG_VERSION"))
    }
}
