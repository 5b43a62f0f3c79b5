//! ## winpan-core::audio
//! **Audio stream bookkeeping**
//!
//! - `sink_input/`: fixed-capacity table of streams and their owning pids
//! - `volume/`: per-channel volume levels

pub mod sink_input;
pub mod volume;

pub use sink_input::{SinkInput, SinkInputIndex, SinkInputState, SinkInputTable, SlotId};
pub use volume::{ChannelVolumes, Volume, MAX_CHANNELS, VOLUME_NORM};
