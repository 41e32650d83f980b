//! Builder for the eviction engine.
//!
//! Collects the construction-time knobs and validates them in one place.
//!
//! ## Example
//!
//! ```
//! use sievekit::builder::SieveEngineBuilder;
//! use sievekit::ds::NodeId;
//!
//! let engine = SieveEngineBuilder::new(1024)
//!     .buffer_capacity(16)
//!     .try_build()
//!     .expect("valid configuration");
//!
//! engine.link_at_head(NodeId::from_index(0));
//! assert_eq!(engine.len(), 1);
//! ```

use crate::ds::evict_buffer::{BufferVariant, CandidateBuffer};
use crate::ds::sieve_list::SieveList;
use crate::error::ConfigError;
use crate::policy::sieve::{SieveEngine, SweepVariant};

/// Default staging-buffer capacity.
pub const DEFAULT_BUFFER_CAPACITY: usize = 16;

/// Default and minimum bound on full sweep turns before a refill gives up.
pub const MIN_ABORT_TURN_LIMIT: u32 = 2;

/// Configures and builds a [`SieveEngine`].
#[derive(Debug, Clone)]
pub struct SieveEngineBuilder {
    node_capacity: usize,
    buffer_capacity: usize,
    sweep_variant: SweepVariant,
    buffer_variant: BufferVariant,
    abort_turn_limit: u32,
}

impl SieveEngineBuilder {
    /// Starts a builder for an engine over `node_capacity` hook slots.
    pub fn new(node_capacity: usize) -> Self {
        Self {
            node_capacity,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            sweep_variant: SweepVariant::Sieve,
            buffer_variant: BufferVariant::SlotArray,
            abort_turn_limit: MIN_ABORT_TURN_LIMIT,
        }
    }

    /// Sets the staging-buffer capacity (slots or queue length).
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Selects the sweep algorithm. Defaults to [`SweepVariant::Sieve`].
    pub fn sweep_variant(mut self, variant: SweepVariant) -> Self {
        self.sweep_variant = variant;
        self
    }

    /// Selects the staging-buffer shape. Defaults to
    /// [`BufferVariant::SlotArray`].
    pub fn buffer_variant(mut self, variant: BufferVariant) -> Self {
        self.buffer_variant = variant;
        self
    }

    /// Bounds how many full turns a refill sweep may take before giving
    /// up. Must be at least [`MIN_ABORT_TURN_LIMIT`].
    pub fn abort_turn_limit(mut self, limit: u32) -> Self {
        self.abort_turn_limit = limit;
        self
    }

    /// Validates the configuration and builds the engine.
    pub fn try_build(self) -> Result<SieveEngine, ConfigError> {
        if self.node_capacity == 0 {
            return Err(ConfigError::new("node_capacity must be > 0"));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::new("buffer_capacity must be > 0"));
        }
        if self.abort_turn_limit < MIN_ABORT_TURN_LIMIT {
            return Err(ConfigError::new(format!(
                "abort_turn_limit must be >= {MIN_ABORT_TURN_LIMIT}"
            )));
        }

        Ok(SieveEngine::from_parts(
            SieveList::new(self.node_capacity),
            CandidateBuffer::new(self.buffer_variant, self.buffer_capacity),
            self.sweep_variant,
            self.abort_turn_limit,
        ))
    }
}
