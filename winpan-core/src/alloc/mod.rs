//! ## winpan-core::alloc
//! **Fixed-buffer arena allocation**
//!
//! ### Key Submodules:
//! - `arena/`: bump allocator over one caller-provided buffer, O(1) reset
//! - `stats/`: allocation and reset counters

pub mod arena;
pub mod stats;

pub use arena::{AllocFlags, Arena, OomPolicy, Zeroable};
pub use stats::ArenaStats;
