pub use crate::builder::SieveEngineBuilder;
pub use crate::ds::{BufferVariant, Direction, HookArena, NodeId, SieveList};
pub use crate::error::{ConfigError, InvariantError};
pub use crate::policy::sieve::{SieveEngine, SweepVariant};

#[cfg(feature = "metrics")]
pub use crate::metrics::EngineMetricsSnapshot;
