//! CLI command implementations for the `scholar` binary.

pub mod keys;
pub mod token;
