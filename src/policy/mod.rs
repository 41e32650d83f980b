pub mod sieve;

pub use sieve::{SieveEngine, SweepVariant};
