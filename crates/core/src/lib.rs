//! Shared domain logic for the storyreel generation workspace.
//!
//! Everything here is pure: no I/O, no async. Persistence, provider and
//! storage crates build on these types.

pub mod crypto;
pub mod error;
pub mod grouping;
pub mod media;
pub mod model;
pub mod prompt;
pub mod scheduling;
pub mod shot;
pub mod task;
pub mod types;
