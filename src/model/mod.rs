//! # Record Model
//!
//! The values intel modules hand to the loader and that jobs carry as
//! parameters. Plain data with no I/O.

pub mod value;
pub mod property_map;
pub mod update_tag;

pub use value::Value;
pub use property_map::{PropertyMap, property_map, merged};
pub use update_tag::UpdateTag;
