//! ## winpan-core::alloc::arena
//! **Fixed-buffer bump arena**
//!
//! The arena owns one contiguous byte buffer and hands out allocations from
//! the top of its free region downward. Individual allocations are never
//! freed; [`Arena::reset`] returns the whole buffer in O(1).
//!
//! References returned by the typed helpers borrow the arena immutably, while
//! `reset` needs `&mut self`, so the borrow checker rejects any reference that
//! would outlive a reset. Destructors of arena-allocated values never run.

use std::alloc::Layout;
use std::cell::Cell;
use std::fmt;
use std::ops::BitOr;
use std::ptr::{self, NonNull};
use std::slice;

use tracing::error;

use super::stats::ArenaStats;
use crate::error::ArenaError;

/// Per-call allocation flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocFlags(u32);

impl AllocFlags {
    /// Zero-filled allocation, failure handled by the arena's [`OomPolicy`].
    pub const NONE: Self = Self(0);
    /// Return an empty result on exhaustion instead of applying the [`OomPolicy`].
    pub const SOFT_FAIL: Self = Self(1 << 0);
    /// Skip zero-filling the returned region.
    pub const NO_ZERO: Self = Self(1 << 1);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AllocFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// What the arena does when a request does not fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OomPolicy {
    /// Return [`ArenaError::OutOfMemory`].
    #[default]
    Error,
    /// Log and abort the process.
    Abort,
}

/// Types for which the all-zero bit pattern is a valid value.
///
/// # Safety
/// Implementors must have no padding-dependent invariants, references or
/// niches that exclude zero.
pub unsafe trait Zeroable: Copy {}

macro_rules! zeroable {
    ($($ty:ty),*) => {
        $(unsafe impl Zeroable for $ty {})*
    };
}

zeroable!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// A bump allocator over a single caller-provided buffer.
pub struct Arena {
    base: NonNull<u8>,
    capacity: usize,
    /// Offset one past the last free byte; the free region is `[0, end)`.
    end: Cell<usize>,
    policy: OomPolicy,
    stats: Cell<ArenaStats>,
}

// SAFETY: the arena uniquely owns its buffer. Handing out `&mut T` requires a
// shared borrow of the arena, so moving it to another thread is only possible
// once every such borrow has ended.
unsafe impl Send for Arena {}

impl Arena {
    /// Binds an arena to `buffer`. No allocation happens here.
    pub fn new(buffer: Box<[u8]>) -> Self {
        let capacity = buffer.len();
        let raw = Box::into_raw(buffer) as *mut u8;
        Self {
            // SAFETY: `Box::into_raw` never returns null.
            base: unsafe { NonNull::new_unchecked(raw) },
            capacity,
            end: Cell::new(capacity),
            policy: OomPolicy::default(),
            stats: Cell::new(ArenaStats::default()),
        }
    }

    /// Allocates a zeroed buffer of `capacity` bytes and binds an arena to it.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(vec![0u8; capacity].into_boxed_slice())
    }

    /// Sets the out-of-memory policy.
    pub fn with_policy(mut self, policy: OomPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> OomPolicy {
        self.policy
    }

    /// Total size of the backing buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still available (before alignment padding).
    pub fn remaining(&self) -> usize {
        self.end.get()
    }

    /// Bytes consumed since the last reset, padding included.
    pub fn used(&self) -> usize {
        self.capacity - self.end.get()
    }

    pub fn stats(&self) -> ArenaStats {
        self.stats.get()
    }

    /// Releases every allocation at once.
    pub fn reset(&mut self) {
        self.end.set(self.capacity);
        let mut stats = self.stats.get();
        stats.resets += 1;
        self.stats.set(stats);
    }

    /// Reserves `size * count` bytes aligned to `align`.
    ///
    /// `align` must be a power of two. The region is zero-filled unless
    /// [`AllocFlags::NO_ZERO`] is passed. When the request does not fit,
    /// [`AllocFlags::SOFT_FAIL`] yields `Ok(None)`; without it the arena's
    /// [`OomPolicy`] applies.
    pub fn alloc_raw(
        &self,
        size: usize,
        align: usize,
        count: usize,
        flags: AllocFlags,
    ) -> Result<Option<NonNull<u8>>, ArenaError> {
        match self.reserve(size, align, count, flags) {
            Some(ptr) => Ok(Some(ptr)),
            None if flags.contains(AllocFlags::SOFT_FAIL) => Ok(None),
            None => Err(self.out_of_memory(size.saturating_mul(count))),
        }
    }

    /// Allocates `len` zeroed elements, or `None` if they do not fit.
    ///
    /// Never aborts, whatever the [`OomPolicy`].
    #[allow(clippy::mut_from_ref)]
    pub fn try_alloc_zeroed_slice<T: Zeroable>(&self, len: usize) -> Option<&mut [T]> {
        let layout = Layout::new::<T>();
        let ptr = self.reserve(layout.size(), layout.align(), len, AllocFlags::SOFT_FAIL)?;
        // SAFETY: zero-filled region sized and aligned for `len` values of
        // `T`, for which all-zero bytes are a valid value.
        Some(unsafe { slice::from_raw_parts_mut(ptr.as_ptr().cast::<T>(), len) })
    }

    fn reserve(
        &self,
        size: usize,
        align: usize,
        count: usize,
        flags: AllocFlags,
    ) -> Option<NonNull<u8>> {
        assert!(align.is_power_of_two(), "alignment must be a power of two");

        let total = size.checked_mul(count)?;
        let base = self.base.as_ptr() as usize;
        let top = base + self.end.get();
        let start = top.checked_sub(total)? & !(align - 1);
        if start < base {
            return None;
        }

        let offset = start - base;
        self.end.set(offset);

        let mut stats = self.stats.get();
        stats.allocations += 1;
        stats.high_water = stats.high_water.max(self.capacity - offset);
        self.stats.set(stats);

        // SAFETY: `offset + total <= capacity`, so the region lies in the buffer.
        let ptr = unsafe { self.base.as_ptr().add(offset) };
        if !flags.contains(AllocFlags::NO_ZERO) {
            // SAFETY: same region as above, not handed out to anyone else yet.
            unsafe { ptr::write_bytes(ptr, 0, total) };
        }
        NonNull::new(ptr)
    }

    /// Moves `value` into the arena.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc<T>(&self, value: T) -> Result<&mut T, ArenaError> {
        let ptr = self.alloc_layout(Layout::new::<T>(), 1)?.cast::<T>();
        // SAFETY: properly sized and aligned fresh region.
        unsafe {
            ptr.as_ptr().write(value);
            Ok(&mut *ptr.as_ptr())
        }
    }

    /// Allocates `len` elements, initialising element `i` with `f(i)`.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_fill_with<T, F>(&self, len: usize, mut f: F) -> Result<&mut [T], ArenaError>
    where
        F: FnMut(usize) -> T,
    {
        let ptr = self.alloc_layout(Layout::new::<T>(), len)?.cast::<T>();
        // SAFETY: every element is written before the slice is formed.
        unsafe {
            for i in 0..len {
                ptr.as_ptr().add(i).write(f(i));
            }
            Ok(slice::from_raw_parts_mut(ptr.as_ptr(), len))
        }
    }

    /// Allocates `len` copies of `value`.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy<T: Copy>(&self, len: usize, value: T) -> Result<&mut [T], ArenaError> {
        self.alloc_slice_fill_with(len, |_| value)
    }

    /// Allocates `len` zeroed bytes.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_bytes(&self, len: usize) -> Result<&mut [u8], ArenaError> {
        let ptr = self.alloc_or_fail(1, 1, len, AllocFlags::NONE)?;
        // SAFETY: zero-filled region of `len` bytes.
        Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), len) })
    }

    fn alloc_layout(&self, layout: Layout, count: usize) -> Result<NonNull<u8>, ArenaError> {
        // Typed helpers initialise the memory themselves.
        self.alloc_or_fail(layout.size(), layout.align(), count, AllocFlags::NO_ZERO)
    }

    fn alloc_or_fail(
        &self,
        size: usize,
        align: usize,
        count: usize,
        flags: AllocFlags,
    ) -> Result<NonNull<u8>, ArenaError> {
        self.reserve(size, align, count, flags)
            .ok_or_else(|| self.out_of_memory(size.saturating_mul(count)))
    }

    fn out_of_memory(&self, requested: usize) -> ArenaError {
        if self.policy == OomPolicy::Abort {
            error!(requested, available = self.remaining(), "arena exhausted, aborting");
            std::process::abort();
        }
        ArenaError::OutOfMemory {
            requested,
            available: self.remaining(),
        }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let raw = ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.capacity);
        // SAFETY: reclaims the box leaked in `new`.
        drop(unsafe { Box::from_raw(raw) });
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity)
            .field("used", &self.used())
            .field("policy", &self.policy)
            .finish()
    }
}
