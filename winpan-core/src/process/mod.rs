//! ## winpan-core::process
//! **Process ancestry discovery**
//!
//! Each query scans the process table into a fresh arena, builds a forest of
//! [`AncestryNode`]s through an open-addressing [`ProcessIndex`] and walks it
//! depth-first from the target pid.
//!
//! ### Key Submodules:
//! - `source/`: `/proc` and in-memory process tables, stat line parsing
//! - `index/`: pid → node table, fixed power-of-two capacity
//! - `tree/`: scan and link, descendant queries, debug rendering
//! - `collect/`: pre-order traversal into a caller-sized buffer

pub mod collect;
pub mod index;
pub mod node;
pub mod source;
pub mod tree;

/// Kernel process identifier.
pub type Pid = i32;

pub use collect::collect_into;
pub use index::{ProcessIndex, BYTES_PER_SLOT};
pub use node::{AncestryNode, Children};
pub use source::{parse_stat, MemorySource, ProcFs, ProcessSource, StatFields};
pub use tree::{descendants_of, ProcessTree};
