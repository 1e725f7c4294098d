//! The transformations between parsing and code generation, in pipeline order.
//!
//! Each phase takes the previous [`Forest`](crate::tree::Forest) by value and returns a new
//! one whose alerts extend the old ones. [`unit`](crate::unit) sequences them.

pub mod ifexpand;
pub mod reparent;
pub mod bind;
pub mod collapse;
pub mod phinsert;
pub mod escape;
pub mod validate;
pub mod flatten;
pub mod pivot;
pub mod i18ncheck;
pub mod msgextract;

#[cfg(test)]
mod testing;

pub use bind::{BoundTree, CallableResolver};
pub use msgextract::MessageExtractedTree;
pub use reparent::Reparenter;
