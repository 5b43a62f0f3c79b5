//! ## winpan-core::alloc::stats
//! **Arena usage counters**
//!
//! Plain counters kept by each [`Arena`](super::arena::Arena). The arena is
//! single-threaded, so these are copied in and out of a `Cell` rather than
//! stored in atomics.

/// Snapshot of an arena's lifetime counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Successful allocations since creation.
    pub allocations: usize,
    /// Number of `reset` calls since creation.
    pub resets: usize,
    /// Largest number of bytes in use at any point, padding included.
    pub high_water: usize,
}

impl ArenaStats {
    /// Fraction of `capacity` reached by the high-water mark.
    pub fn peak_utilisation(&self, capacity: usize) -> f64 {
        if capacity == 0 {
            return 0.0;
        }
        self.high_water as f64 / capacity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::arena::Arena;

    #[test]
    fn test_stats_track_allocations_and_resets() {
        let mut arena = Arena::with_capacity(1024);
        for _ in 0..10 {
            arena.alloc(0u64).unwrap();
        }
        arena.reset();
        arena.alloc(0u64).unwrap();

        let stats = arena.stats();
        assert_eq!(stats.allocations, 11);
        assert_eq!(stats.resets, 1);
        assert!(stats.high_water >= 80);
    }

    #[test]
    fn test_peak_utilisation() {
        let stats = ArenaStats {
            high_water: 256,
            ..ArenaStats::default()
        };
        assert_eq!(stats.peak_utilisation(1024), 0.25);
        assert_eq!(stats.peak_utilisation(0), 0.0);
    }
}
