//! # Cypher IR
//!
//! Structured representation of the write queries the compilers produce,
//! and the renderer that turns it into text. Nothing here touches a store.

pub mod ast;
pub mod render;

pub use ast::Query;
pub use render::render;
