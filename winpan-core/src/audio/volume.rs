//! Per-channel volume levels of one audio stream.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VolumeError;

/// Linear volume level of one channel.
pub type Volume = u32;

/// 100% volume.
pub const VOLUME_NORM: Volume = 0x10000;

/// Most channels a stream can carry.
pub const MAX_CHANNELS: usize = 32;

/// A fixed-size set of channel levels.
///
/// The default value has zero channels, which is what a released record holds.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Volume>", into = "Vec<Volume>")]
pub struct ChannelVolumes {
    channels: u8,
    values: [Volume; MAX_CHANNELS],
}

impl ChannelVolumes {
    pub fn new(levels: &[Volume]) -> Result<Self, VolumeError> {
        if levels.len() > MAX_CHANNELS {
            return Err(VolumeError::TooManyChannels(levels.len()));
        }
        let mut values = [0; MAX_CHANNELS];
        values[..levels.len()].copy_from_slice(levels);
        Ok(Self {
            channels: levels.len() as u8,
            values,
        })
    }

    pub fn mono(level: Volume) -> Self {
        let mut values = [0; MAX_CHANNELS];
        values[0] = level;
        Self {
            channels: 1,
            values,
        }
    }

    pub fn stereo(left: Volume, right: Volume) -> Self {
        let mut values = [0; MAX_CHANNELS];
        values[0] = left;
        values[1] = right;
        Self {
            channels: 2,
            values,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels as usize
    }

    pub fn as_slice(&self) -> &[Volume] {
        &self.values[..self.channels()]
    }

    /// First two channels, if present.
    pub fn front_pair(&self) -> Option<(Volume, Volume)> {
        (self.channels >= 2).then(|| (self.values[0], self.values[1]))
    }

    /// Copy with the first two channels replaced. `None` below two channels.
    pub fn with_front_pair(&self, left: Volume, right: Volume) -> Option<Self> {
        self.front_pair()?;
        let mut copy = *self;
        copy.values[0] = left;
        copy.values[1] = right;
        Some(copy)
    }

    /// Copy with both front channels set to their mean.
    pub fn centred(&self) -> Option<Self> {
        let (left, right) = self.front_pair()?;
        let mean = ((left as u64 + right as u64) / 2) as Volume;
        self.with_front_pair(mean, mean)
    }
}

impl Default for ChannelVolumes {
    fn default() -> Self {
        Self {
            channels: 0,
            values: [0; MAX_CHANNELS],
        }
    }
}

impl TryFrom<Vec<Volume>> for ChannelVolumes {
    type Error = VolumeError;

    fn try_from(levels: Vec<Volume>) -> Result<Self, Self::Error> {
        Self::new(&levels)
    }
}

impl From<ChannelVolumes> for Vec<Volume> {
    fn from(volumes: ChannelVolumes) -> Self {
        volumes.as_slice().to_vec()
    }
}

impl fmt::Debug for ChannelVolumes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}
