//! Cachet: a blog API whose document reads go through a per-actor,
//! read-through query cache backed by Redis.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
