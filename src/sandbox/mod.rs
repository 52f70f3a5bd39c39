//! Sandbox module containing all execution-related components.

pub mod catalog;
pub mod config;
pub mod executor;
pub mod guard;
pub mod quota;
pub mod scope;
