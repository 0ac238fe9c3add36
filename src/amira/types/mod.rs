//! Foundational data structures, error types, and the image container boundary.

pub mod error;
pub mod models;
pub mod stack;
