//! Per-tick scratch arena
//!
//! One contiguous buffer handed out in bump order through scope guards. A
//! scope owns everything allocated through it; dropping the guard pops the
//! allocations, and nested scopes can only be opened from a live parent, so
//! the stack discipline is checked by the borrow checker. The arena is cleared
//! at the start of every tick and again after drawing. A guard that was leaked
//! (e.g. `mem::forget`) leaves the open-scope count non-zero and is reported by
//! `clear`.

use std::mem::{align_of, size_of};

use bytemuck::Pod;
use thiserror::Error;

/// Arena word; every allocation starts on a word boundary
type Word = u64;
const WORD_BYTES: usize = size_of::<Word>();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScratchError {
    #[error("{open} scratch scope(s) still open at clear")]
    LeakedScopes { open: usize },
}

#[derive(Debug, Default)]
struct ScratchStats {
    open_scopes: usize,
    /// Peak words in use since the last clear
    high_water: usize,
    /// Peak words in use over the arena's lifetime
    peak: usize,
}

/// Frame scratch arena
#[derive(Debug)]
pub struct FrameScratch {
    words: Vec<Word>,
    stats: ScratchStats,
}

impl FrameScratch {
    /// Create an arena of at least `bytes` bytes
    pub fn new(bytes: usize) -> Self {
        Self {
            words: vec![0; bytes.div_ceil(WORD_BYTES)],
            stats: ScratchStats::default(),
        }
    }

    pub fn capacity_bytes(&self) -> usize {
        self.words.len() * WORD_BYTES
    }

    /// Peak bytes in use since the last clear
    pub fn high_water_bytes(&self) -> usize {
        self.stats.high_water * WORD_BYTES
    }

    /// Peak bytes in use since creation
    pub fn peak_bytes(&self) -> usize {
        self.stats.peak * WORD_BYTES
    }

    pub fn open_scopes(&self) -> usize {
        self.stats.open_scopes
    }

    /// Open the outermost scope
    pub fn scope(&mut self) -> ScratchScope<'_> {
        self.stats.open_scopes += 1;
        ScratchScope {
            free: &mut self.words[..],
            base: 0,
            used: 0,
            stats: &mut self.stats,
        }
    }

    /// Reclaim the whole arena. Reports scopes that were never released; the
    /// memory is reclaimed either way.
    pub fn clear(&mut self) -> Result<(), ScratchError> {
        let open = self.stats.open_scopes;
        self.stats.open_scopes = 0;
        self.stats.high_water = 0;
        if open != 0 {
            log::error!("Scratch cleared with {} open scope(s)", open);
            return Err(ScratchError::LeakedScopes { open });
        }
        Ok(())
    }
}

/// Guard for one level of the scratch stack
#[derive(Debug)]
pub struct ScratchScope<'a> {
    free: &'a mut [Word],
    /// Words in use by enclosing scopes
    base: usize,
    /// Words in use by this scope
    used: usize,
    stats: &'a mut ScratchStats,
}

impl<'a> ScratchScope<'a> {
    /// Open a nested scope; its allocations are popped when it drops
    pub fn scope(&mut self) -> ScratchScope<'_> {
        self.stats.open_scopes += 1;
        ScratchScope {
            free: &mut *self.free,
            base: self.base + self.used,
            used: 0,
            stats: &mut *self.stats,
        }
    }

    /// Bytes still available to this scope
    pub fn remaining_bytes(&self) -> usize {
        self.free.len() * WORD_BYTES
    }

    /// Allocate `n` zeroed values. `None` when the arena is exhausted.
    pub fn alloc<T: Pod>(&mut self, n: usize) -> Option<&'a mut [T]> {
        if size_of::<T>() == 0 || align_of::<T>() > WORD_BYTES {
            return None;
        }
        let bytes = n.checked_mul(size_of::<T>())?;
        let words = bytes.div_ceil(WORD_BYTES);
        if words > self.free.len() {
            log::warn!(
                "Scratch exhausted: wanted {} bytes, {} left",
                bytes,
                self.remaining_bytes()
            );
            return None;
        }

        let free = std::mem::take(&mut self.free);
        let (head, tail) = free.split_at_mut(words);
        self.free = tail;
        self.used += words;

        let top = self.base + self.used;
        self.stats.high_water = self.stats.high_water.max(top);
        self.stats.peak = self.stats.peak.max(top);

        let raw: &'a mut [u8] = bytemuck::cast_slice_mut(head);
        let slice: &'a mut [T] = bytemuck::try_cast_slice_mut(&mut raw[..bytes]).ok()?;
        slice.fill(T::zeroed());
        Some(slice)
    }

    /// Allocate a copy of `src`
    pub fn alloc_copy<T: Pod>(&mut self, src: &[T]) -> Option<&'a mut [T]> {
        let dst = self.alloc::<T>(src.len())?;
        dst.copy_from_slice(src);
        Some(dst)
    }
}

impl Drop for ScratchScope<'_> {
    fn drop(&mut self) {
        self.stats.open_scopes = self.stats.open_scopes.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_allocations_coexist() {
        let mut scratch = FrameScratch::new(256);
        let mut scope = scratch.scope();
        let a = scope.alloc::<u32>(3).unwrap();
        let b = scope.alloc::<Vec2>(2).unwrap();
        a[2] = 7;
        b[1] = Vec2::new(1.0, 2.0);
        assert_eq!(a, &[0, 0, 7]);
        assert_eq!(b[1], Vec2::new(1.0, 2.0));
        // 3 u32 round up to two words, 2 Vec2 fill two words
        assert_eq!(scope.remaining_bytes(), 256 - 32);
    }

    #[test]
    fn test_nested_scope_pops() {
        let mut scratch = FrameScratch::new(128);
        let mut outer = scratch.scope();
        let _keep = outer.alloc::<u64>(2).unwrap();
        let first_ptr = {
            let mut inner = outer.scope();
            let tmp = inner.alloc::<u64>(4).unwrap();
            tmp[0] = 99;
            tmp.as_ptr()
        };
        let mut inner = outer.scope();
        let again = inner.alloc::<u64>(4).unwrap();
        assert_eq!(again.as_ptr(), first_ptr);
        // Reused memory comes back zeroed
        assert_eq!(again[0], 0);
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut scratch = FrameScratch::new(16);
        let mut scope = scratch.scope();
        assert!(scope.alloc::<u64>(3).is_none());
        assert!(scope.alloc::<u64>(2).is_some());
        assert!(scope.alloc::<u8>(1).is_none());
    }

    #[test]
    fn test_clear_reports_leaked_scope() {
        let mut scratch = FrameScratch::new(64);
        {
            let mut scope = scratch.scope();
            scope.alloc::<u32>(4);
        }
        assert_eq!(scratch.high_water_bytes(), 16);
        assert!(scratch.clear().is_ok());
        assert_eq!(scratch.high_water_bytes(), 0);

        std::mem::forget(scratch.scope());
        assert_eq!(
            scratch.clear(),
            Err(ScratchError::LeakedScopes { open: 1 })
        );
        // The arena is usable again after the report
        assert_eq!(scratch.open_scopes(), 0);
        assert_eq!(scratch.peak_bytes(), 16);
    }

    #[test]
    fn test_alloc_copy() {
        let mut scratch = FrameScratch::new(64);
        let mut scope = scratch.scope();
        let copy = scope.alloc_copy(&[1u16, 2, 3]).unwrap();
        copy[0] = 10;
        assert_eq!(copy, &[10, 2, 3]);
    }
}
