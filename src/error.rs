//! Error types for the sievekit library.
//!
//! ## Key Components
//!
//! - [`InvariantError`]: Returned when internal list or buffer invariants
//!   are violated (`check_invariants` methods).
//! - [`ConfigError`]: Returned when engine configuration parameters are
//!   invalid (e.g. zero capacity, turn limit below the minimum).
//!
//! ## Example Usage
//!
//! ```
//! use sievekit::error::ConfigError;
//! use sievekit::policy::sieve::SieveEngine;
//!
//! // Fallible construction for user-configurable parameters
//! let engine = SieveEngine::builder(1024).buffer_capacity(16).try_build();
//! assert!(engine.is_ok());
//!
//! // Invalid capacity is caught without panicking
//! let bad: Result<_, ConfigError> = SieveEngine::builder(0).try_build();
//! assert!(bad.is_err());
//! ```
//!
//! Precondition violations (linking an already-linked node, indexing past
//! the arena) and structural inconsistencies observed under the mutation
//! lock are programmer errors, not recoverable states; those panic with a
//! diagnostic dump instead of flowing through these types.

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal engine invariants are violated.
///
/// Produced by `check_invariants` on [`SieveList`](crate::ds::SieveList)
/// and [`SieveEngine`](crate::policy::sieve::SieveEngine). Carries a
/// human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when engine configuration parameters are invalid.
///
/// Produced by [`SieveEngineBuilder::try_build`](crate::builder::SieveEngineBuilder::try_build).
/// Carries a human-readable description of which parameter failed
/// validation.
///
/// # Example
///
/// ```
/// use sievekit::policy::sieve::SieveEngine;
///
/// let err = SieveEngine::builder(1024).abort_turn_limit(1).try_build().unwrap_err();
/// assert!(err.to_string().contains("abort_turn_limit"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- InvariantError ---------------------------------------------------

    #[test]
    fn invariant_display_shows_message() {
        let err = InvariantError::new("len mismatch");
        assert_eq!(err.to_string(), "len mismatch");
    }

    #[test]
    fn invariant_message_accessor() {
        let err = InvariantError::new("test");
        assert_eq!(err.message(), "test");
    }

    #[test]
    fn invariant_clone_and_eq() {
        let a = InvariantError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn invariant_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<InvariantError>();
    }

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("buffer_capacity must be > 0");
        assert_eq!(err.to_string(), "buffer_capacity must be > 0");
    }

    #[test]
    fn config_debug_includes_message() {
        let err = ConfigError::new("bad turn limit");
        let dbg = format!("{:?}", err);
        assert!(dbg.contains("bad turn limit"));
    }

    #[test]
    fn config_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<ConfigError>();
    }
}
