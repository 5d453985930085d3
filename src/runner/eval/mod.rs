//! Identifier references and destructuring binding initialization.

pub mod binding;
pub mod types;

pub use types::{Reference, ReferenceBase};
