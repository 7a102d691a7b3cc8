//! Error types for the reactive layer.

use thiserror::Error;

/// Errors that can occur while reading a cached value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A computed value read itself while it was being evaluated.
    #[error("computed value depends on itself")]
    Cycle,

    /// The host that created the value has been dropped.
    #[error("reactive host has been dropped")]
    HostDropped,
}

/// Result type alias for reactive operations.
pub type Result<T> = std::result::Result<T, ReactiveError>;
