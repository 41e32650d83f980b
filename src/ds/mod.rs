pub mod evict_buffer;
pub mod hook;
pub mod sieve_list;

pub use evict_buffer::BufferVariant;
pub use hook::{HookArena, NodeHook, NodeId};
pub use sieve_list::{Direction, Iter, ListGuard, SieveList};
