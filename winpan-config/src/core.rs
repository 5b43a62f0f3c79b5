//! Core system configuration parameters.
//!
//! Sizing of the per-query scratch memory and the process index, plus the
//! cadence of the event loop.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Core system configuration parameters.
#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct CoreConfig {
    /// Scratch arena sizing.
    #[validate(nested)]
    pub memory: MemoryConfig,

    /// Process table scanning.
    #[validate(nested)]
    pub process: ProcessConfig,

    /// Event loop timing.
    #[validate(nested)]
    pub event_loop: EventLoopConfig,
}

/// Scratch arena configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    /// Size of the scratch arena backing buffer (bytes).
    #[validate(range(min = 65536, max = 67108864))]
    pub arena_size: usize,

    /// Abort the process instead of returning an error when the arena runs out.
    pub abort_on_exhaustion: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            arena_size: 1024 * 1024,
            abort_on_exhaustion: false,
        }
    }
}

/// Process index and process-information source.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct ProcessConfig {
    /// The pid index holds `2^index_exponent` slots and must exceed the
    /// number of processes on the system.
    #[validate(range(min = 4, max = 22))]
    pub index_exponent: u32,

    /// Mount point of the process-information filesystem.
    #[validate(custom(function = validation::validate_proc_root))]
    pub proc_root: PathBuf,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            index_exponent: 12,
            proc_root: PathBuf::from("/proc"),
        }
    }
}

impl ProcessConfig {
    pub fn index_capacity(&self) -> usize {
        1usize << self.index_exponent
    }
}

/// Event loop timing.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Delay between polling rounds of the window and audio sources (ms).
    #[validate(range(min = 1, max = 1000))]
    pub poll_interval_ms: u64,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
        }
    }
}
