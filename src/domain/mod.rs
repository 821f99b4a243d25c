//! Domain layer types and invariants.

pub mod actor;
pub mod blogs;
pub mod error;
