//! Comparing a fresh build against a prior artifact.

pub mod differ;
pub mod hasher;
