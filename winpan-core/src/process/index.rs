//! Open-addressing pid → node index.
//!
//! The table has `2^exponent` slots and uses the pid as its own hash. The
//! probe starts at the pid and advances by an odd step taken from the high
//! bits of a multiplicatively mixed pid, so every slot is visited once before
//! the sequence repeats.

use std::cell::Cell;
use std::mem::size_of;

use super::node::AncestryNode;
use super::Pid;
use crate::alloc::Arena;
use crate::error::ProcessError;

const MIX: u64 = 0x9E37_79B9_7F4A_7C15;

type Slot<'a> = Cell<Option<&'a AncestryNode<'a>>>;

/// Arena bytes one index slot can cost in a query: the slot, the node it
/// points at and its entry in the descendant buffer.
pub const BYTES_PER_SLOT: usize =
    size_of::<Slot<'static>>() + size_of::<AncestryNode<'static>>() + size_of::<Pid>();

/// Probe step for `pid` in a table of `2^exponent` slots. Always odd.
#[inline]
fn probe_step(pid: Pid, exponent: u32) -> u32 {
    let hash = (pid as u32 as u64).wrapping_mul(MIX);
    ((hash >> (64 - exponent)) as u32) | 1
}

/// Fixed-capacity map from pid to arena-allocated [`AncestryNode`].
pub struct ProcessIndex<'a> {
    arena: &'a Arena,
    slots: &'a [Slot<'a>],
    exponent: u32,
    len: Cell<usize>,
}

impl<'a> ProcessIndex<'a> {
    /// Allocates an empty index of `2^exponent` slots from `arena`.
    ///
    /// # Panics
    /// If `exponent` is outside `1..=31`.
    pub fn with_exponent(arena: &'a Arena, exponent: u32) -> Result<Self, ProcessError> {
        assert!(
            (1..=31).contains(&exponent),
            "index exponent must be in 1..=31"
        );
        let slots = arena.alloc_slice_fill_with(1usize << exponent, |_| Cell::new(None))?;
        Ok(Self {
            arena,
            slots,
            exponent,
            len: Cell::new(0),
        })
    }

    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of distinct nodes created so far.
    pub fn len(&self) -> usize {
        self.len.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    /// Returns the node for `pid`, creating it on first sight.
    ///
    /// Calling this twice with the same pid always yields the same node.
    pub fn get_or_create(&self, pid: Pid) -> Result<&'a AncestryNode<'a>, ProcessError> {
        let mask = (self.slots.len() - 1) as u32;
        let step = probe_step(pid, self.exponent);
        let mut index = pid as u32;
        for _ in 0..self.slots.len() {
            index = index.wrapping_add(step) & mask;
            let slot = &self.slots[index as usize];
            match slot.get() {
                None => {
                    let node: &'a AncestryNode<'a> = self.arena.alloc(AncestryNode::new(pid))?;
                    slot.set(Some(node));
                    self.len.set(self.len.get() + 1);
                    return Ok(node);
                }
                Some(node) if node.pid() == pid => return Ok(node),
                Some(_) => {}
            }
        }
        Err(ProcessError::IndexFull {
            pid,
            capacity: self.slots.len(),
        })
    }

    /// Looks `pid` up without creating it.
    pub fn get(&self, pid: Pid) -> Option<&'a AncestryNode<'a>> {
        let mask = (self.slots.len() - 1) as u32;
        let step = probe_step(pid, self.exponent);
        let mut index = pid as u32;
        for _ in 0..self.slots.len() {
            index = index.wrapping_add(step) & mask;
            match self.slots[index as usize].get() {
                None => return None,
                Some(node) if node.pid() == pid => return Some(node),
                Some(_) => {}
            }
        }
        None
    }

    /// Every node in slot order.
    pub fn nodes(&self) -> impl Iterator<Item = &'a AncestryNode<'a>> + '_ {
        self.slots.iter().filter_map(|slot| slot.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::ptr;

    #[test]
    fn test_probe_step_is_odd() {
        for pid in [0, 1, 2, 1000, 4_194_304, -1] {
            for exponent in 1..=31 {
                assert_eq!(probe_step(pid, exponent) % 2, 1);
            }
        }
    }

    #[test]
    fn test_probe_visits_every_slot() {
        let exponent = 6;
        let mask = (1u32 << exponent) - 1;
        let step = probe_step(12345, exponent);
        let mut index = 12345u32;
        let mut seen = HashSet::new();
        for _ in 0..(1 << exponent) {
            index = index.wrapping_add(step) & mask;
            seen.insert(index);
        }
        assert_eq!(seen.len(), 1 << exponent);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let arena = Arena::with_capacity(64 * 1024);
        let index = ProcessIndex::with_exponent(&arena, 8).unwrap();

        let first = index.get_or_create(42).unwrap();
        for pid in 100..150 {
            index.get_or_create(pid).unwrap();
        }
        let second = index.get_or_create(42).unwrap();

        assert!(ptr::eq(first, second));
        assert_eq!(index.len(), 51);
        assert!(ptr::eq(index.get(42).unwrap(), first));
        assert!(index.get(7).is_none());
    }

    #[test]
    fn test_full_index_reports_capacity() {
        let arena = Arena::with_capacity(16 * 1024);
        let index = ProcessIndex::with_exponent(&arena, 3).unwrap();
        for pid in 1..=8 {
            index.get_or_create(pid).unwrap();
        }
        // Existing pids are still found in a full table.
        assert_eq!(index.get_or_create(5).unwrap().pid(), 5);

        match index.get_or_create(9) {
            Err(ProcessError::IndexFull { pid, capacity }) => {
                assert_eq!(pid, 9);
                assert_eq!(capacity, 8);
            }
            other => panic!("expected IndexFull, got {:?}", other.map(|n| n.pid())),
        }
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_bytes_per_slot_layout() {
        assert_eq!(size_of::<Slot<'static>>(), 8);
        assert_eq!(size_of::<AncestryNode<'static>>(), 32);
        assert_eq!(BYTES_PER_SLOT, 44);
    }

    #[test]
    fn test_full_query_fits_in_slot_budget() {
        let exponent = 4;
        let slots = 1usize << exponent;
        let arena = Arena::with_capacity(slots * BYTES_PER_SLOT);
        // 15 children plus the synthetic parent fill every slot.
        let pairs = (1..slots as Pid).map(|pid| (pid, 0));
        let tree = crate::process::ProcessTree::from_pairs(&arena, exponent, pairs).unwrap();
        assert_eq!(tree.node_count(), slots);
        assert_eq!(tree.descendants(0).unwrap().len(), slots);
    }

    #[test]
    fn test_slots_come_from_the_arena() {
        let arena = Arena::with_capacity(4096);
        assert!(ProcessIndex::with_exponent(&arena, 12).is_err());
    }

    proptest! {
        #[test]
        fn prop_get_or_create_returns_same_node(
            pids in proptest::collection::vec(0i32..100_000, 1..200)
        ) {
            let arena = Arena::with_capacity(256 * 1024);
            let index = ProcessIndex::with_exponent(&arena, 10).unwrap();
            let nodes: Vec<_> = pids.iter().map(|&pid| index.get_or_create(pid).unwrap()).collect();
            for (pid, node) in pids.iter().zip(&nodes) {
                prop_assert_eq!(node.pid(), *pid);
                prop_assert!(ptr::eq(index.get_or_create(*pid).unwrap(), *node));
            }
            let distinct: HashSet<_> = pids.iter().collect();
            prop_assert_eq!(index.len(), distinct.len());
        }
    }
}
