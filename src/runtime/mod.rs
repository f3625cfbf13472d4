//! Single-writer session runtime and its handle API.

/// Handle and command loop implementation.
pub mod handle;
