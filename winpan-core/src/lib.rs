//! # winpan-core
//!
//! Process ancestry discovery and audio stream bookkeeping for winpan.
//!
//! ### Key Submodules:
//! - `alloc`: fixed-buffer bump arena with O(1) reset
//! - `process`: `/proc` scanning, pid index, ancestry forest, descendant walk
//! - `audio`: sink-input table and channel volumes

pub mod alloc;
pub mod audio;
pub mod error;
pub mod process;

pub mod prelude {
    pub use crate::alloc::*;
    pub use crate::audio::*;
    pub use crate::error::*;
    pub use crate::process::*;
}

pub use error::{ArenaError, ProcessError, StatParseError, VolumeError};
