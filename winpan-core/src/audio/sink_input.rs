//! Fixed-capacity table of tracked sink inputs.
//!
//! A record moves through `Empty → PendingOwner → Owned → Empty`. The owner
//! is resolved asynchronously; until then the record never matches a pid
//! lookup. Lookups are linear scans over the whole table.

use std::fmt;

use tracing::{debug, warn};

use super::volume::ChannelVolumes;
use crate::process::Pid;

/// Audio-server index of a sink input.
pub type SinkInputIndex = u32;

/// Position of a record in a [`SinkInputTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct SlotId(pub usize);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkInputState {
    Empty,
    PendingOwner,
    Owned,
}

/// One tracked audio stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SinkInput {
    index: Option<SinkInputIndex>,
    pid: Option<Pid>,
    volume: ChannelVolumes,
    applied: Option<ChannelVolumes>,
    owner_requested: bool,
}

impl SinkInput {
    pub fn index(&self) -> Option<SinkInputIndex> {
        self.index
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// The stream's own volume, as last reported by the audio server.
    pub fn volume(&self) -> &ChannelVolumes {
        &self.volume
    }

    /// The volume this process last asked the server to apply.
    pub fn applied(&self) -> Option<&ChannelVolumes> {
        self.applied.as_ref()
    }

    pub fn state(&self) -> SinkInputState {
        match (self.index, self.pid) {
            (None, _) => SinkInputState::Empty,
            (Some(_), None) => SinkInputState::PendingOwner,
            (Some(_), Some(_)) => SinkInputState::Owned,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_none()
    }

    /// True when the owner is unknown and nobody has asked for it yet.
    pub fn needs_owner_request(&self) -> bool {
        self.index.is_some() && self.pid.is_none() && !self.owner_requested
    }

    pub fn mark_owner_requested(&mut self) {
        self.owner_requested = true;
    }

    /// Records the owning pid. Ignored on an empty slot.
    pub fn set_owner(&mut self, pid: Pid) -> bool {
        if self.index.is_none() {
            return false;
        }
        self.pid = Some(pid);
        self.owner_requested = false;
        true
    }

    /// Stores a server-reported volume.
    ///
    /// A report equal to the volume we applied ourselves is an echo of our own
    /// adjustment and leaves the stream volume untouched. Returns whether the
    /// stream volume changed.
    pub fn update_volume(&mut self, reported: ChannelVolumes) -> bool {
        if self.applied.as_ref() == Some(&reported) {
            return false;
        }
        self.applied = None;
        let changed = self.volume != reported;
        self.volume = reported;
        changed
    }

    pub fn set_applied(&mut self, volume: ChannelVolumes) {
        self.applied = Some(volume);
    }

    fn release(&mut self) {
        *self = Self::default();
    }
}

/// Fixed-capacity, linearly scanned sink-input table.
pub struct SinkInputTable {
    slots: Box<[SinkInput]>,
}

impl SinkInputTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![SinkInput::default(); capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied records.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(SinkInput::is_empty)
    }

    /// Claims the first empty record for `index`.
    ///
    /// Returns the existing record if `index` is already tracked and `None`
    /// when the table is full; the stream then goes untracked.
    pub fn add_slot(&mut self, index: SinkInputIndex) -> Option<SlotId> {
        if let Some(existing) = self.find_slot(index) {
            return Some(existing);
        }
        let Some(position) = self.slots.iter().position(SinkInput::is_empty) else {
            warn!(
                sink_input = index,
                capacity = self.slots.len(),
                "sink input table full, stream not tracked"
            );
            return None;
        };
        let slot = &mut self.slots[position];
        slot.release();
        slot.index = Some(index);
        debug!(sink_input = index, slot = position, "sink input slot claimed");
        Some(SlotId(position))
    }

    pub fn find_slot(&self, index: SinkInputIndex) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| s.index == Some(index))
            .map(SlotId)
    }

    pub fn find_by_index(&self, index: SinkInputIndex) -> Option<&SinkInput> {
        self.slots.iter().find(|s| s.index == Some(index))
    }

    pub fn find_by_index_mut(&mut self, index: SinkInputIndex) -> Option<&mut SinkInput> {
        self.slots.iter_mut().find(|s| s.index == Some(index))
    }

    /// First record owned by `pid`.
    pub fn find_by_pid(&self, pid: Pid) -> Option<&SinkInput> {
        self.slots
            .iter()
            .find(|s| s.index.is_some() && s.pid == Some(pid))
    }

    /// Every record owned by `pid`.
    pub fn owned_by(&self, pid: Pid) -> impl Iterator<Item = (SlotId, &SinkInput)> + '_ {
        self.iter_occupied()
            .filter(move |(_, record)| record.pid == Some(pid))
    }

    pub fn owned_by_mut(&mut self, pid: Pid) -> impl Iterator<Item = &mut SinkInput> + '_ {
        self.slots
            .iter_mut()
            .filter(move |s| s.index.is_some() && s.pid == Some(pid))
    }

    pub fn get(&self, slot: SlotId) -> Option<&SinkInput> {
        self.slots.get(slot.0)
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut SinkInput> {
        self.slots.get_mut(slot.0)
    }

    /// Releases the record for `index`. No-op if it is not tracked.
    pub fn remove(&mut self, index: SinkInputIndex) -> bool {
        match self.find_by_index_mut(index) {
            Some(record) => {
                record.release();
                debug!(sink_input = index, "sink input released");
                true
            }
            None => false,
        }
    }

    pub fn iter_occupied(&self) -> impl Iterator<Item = (SlotId, &SinkInput)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(i, s)| (SlotId(i), s))
    }
}

impl fmt::Display for SinkInputTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (slot, record) in self.iter_occupied() {
            let index = record.index.unwrap_or_default();
            match record.pid {
                Some(pid) => writeln!(f, "{slot} sink_input={index} pid={pid} volume={:?}", record.volume)?,
                None => writeln!(f, "{slot} sink_input={index} pid=? volume={:?}", record.volume)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_remove() {
        let mut table = SinkInputTable::new(4);
        let slot = table.add_slot(5).unwrap();
        assert_eq!(table.get(slot).unwrap().state(), SinkInputState::PendingOwner);
        assert!(table.find_by_index(5).is_some());

        assert!(table.remove(5));
        assert!(table.find_by_index(5).is_none());
        assert_eq!(table.get(slot).unwrap().state(), SinkInputState::Empty);
        assert!(!table.remove(5));
    }

    #[test]
    fn test_pending_owner_not_found_by_pid() {
        let mut table = SinkInputTable::new(4);
        let slot = table.add_slot(5).unwrap();
        assert!(table.find_by_pid(4242).is_none());

        assert!(table.get_mut(slot).unwrap().set_owner(4242));
        let record = table.find_by_pid(4242).unwrap();
        assert_eq!(record.index(), Some(5));
        assert_eq!(record.state(), SinkInputState::Owned);
    }

    #[test]
    fn test_full_table_drops_new_streams() {
        let mut table = SinkInputTable::new(2);
        assert!(table.add_slot(1).is_some());
        assert!(table.add_slot(2).is_some());
        assert!(table.add_slot(3).is_none());

        table.remove(1);
        assert_eq!(table.add_slot(3), Some(SlotId(0)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_add_slot_is_unique_per_index() {
        let mut table = SinkInputTable::new(4);
        let first = table.add_slot(9).unwrap();
        table.get_mut(first).unwrap().set_owner(1);
        assert_eq!(table.add_slot(9), Some(first));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(first).unwrap().pid(), Some(1));
    }

    #[test]
    fn test_reused_slot_starts_clean() {
        let mut table = SinkInputTable::new(1);
        let slot = table.add_slot(1).unwrap();
        {
            let record = table.get_mut(slot).unwrap();
            record.set_owner(77);
            record.update_volume(ChannelVolumes::stereo(10, 10));
        }
        table.remove(1);
        table.add_slot(2).unwrap();

        let record = table.get(slot).unwrap();
        assert_eq!(record.pid(), None);
        assert_eq!(record.volume().channels(), 0);
        assert!(record.needs_owner_request());
    }

    #[test]
    fn test_owner_request_issued_once() {
        let mut table = SinkInputTable::new(1);
        let slot = table.add_slot(1).unwrap();
        let record = table.get_mut(slot).unwrap();
        assert!(record.needs_owner_request());
        record.mark_owner_requested();
        assert!(!record.needs_owner_request());
        record.set_owner(3);
        assert!(!record.needs_owner_request());
    }

    #[test]
    fn test_set_owner_on_empty_slot_is_ignored() {
        let mut table = SinkInputTable::new(1);
        let slot = SlotId(0);
        assert!(!table.get_mut(slot).unwrap().set_owner(3));
        assert!(table.find_by_pid(3).is_none());
    }

    #[test]
    fn test_applied_volume_echo_is_ignored() {
        let mut table = SinkInputTable::new(1);
        let slot = table.add_slot(1).unwrap();
        let record = table.get_mut(slot).unwrap();
        record.update_volume(ChannelVolumes::stereo(100, 100));

        record.set_applied(ChannelVolumes::stereo(100, 20));
        assert!(!record.update_volume(ChannelVolumes::stereo(100, 20)));
        assert_eq!(record.volume(), &ChannelVolumes::stereo(100, 100));

        // A different report means the user changed the stream volume.
        assert!(record.update_volume(ChannelVolumes::stereo(50, 50)));
        assert_eq!(record.volume(), &ChannelVolumes::stereo(50, 50));
        assert!(record.applied().is_none());
    }

    #[test]
    fn test_owned_by_returns_every_match() {
        let mut table = SinkInputTable::new(4);
        for index in [1, 2, 3] {
            let slot = table.add_slot(index).unwrap();
            table.get_mut(slot).unwrap().set_owner(if index == 2 { 8 } else { 7 });
        }
        let indices: Vec<_> = table
            .owned_by(7)
            .filter_map(|(_, record)| record.index())
            .collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(table.find_by_pid(7).unwrap().index(), Some(1));
    }

    #[test]
    fn test_display_lists_occupied_records() {
        let mut table = SinkInputTable::new(3);
        let slot = table.add_slot(4).unwrap();
        table.get_mut(slot).unwrap().set_owner(12);
        table.add_slot(6).unwrap();

        let text = table.to_string();
        assert_eq!(
            text,
            "#0 sink_input=4 pid=12 volume=[]\n#1 sink_input=6 pid=? volume=[]\n"
        );
    }
}
