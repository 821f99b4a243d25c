//! Application services layer.

pub mod blogs;
pub mod documents;
pub mod error;
pub mod query;
