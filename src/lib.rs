//! armforge: typed Rust source to ARM deployment templates.
//!
//! Static discovery of resource declarations, a dependency graph with cycle
//! detection and deterministic order, and synthesis of the template JSON.
//! Nothing in the source tree is executed.

pub mod cli;
pub mod core;
pub mod diff;
