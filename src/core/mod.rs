//! Core pipeline: discovery, resolution, synthesis, assembly.

pub mod assembler;
pub mod catalog;
pub mod config;
pub mod discovery;
pub mod error;
pub mod expression;
pub mod extract;
pub mod literal;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod synth;
pub mod types;
pub mod validate;
