//! Sparse-set object registry
//!
//! Broad-phase membership for solids and actors. `slot` is indexed by handle
//! and stores `dense_index + 1` (0 means absent); `handles` and `objects` are
//! the dense, contiguous arrays iterated by the mover and rope solver.
//!
//! Removal swaps the last dense entry into the hole, so iteration order is not
//! stable across removals.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Stable small-integer handle for a registered object. `0` is reserved.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Pod, Zeroable, Serialize,
    Deserialize,
)]
pub struct ObjectHandle(pub u32);

impl ObjectHandle {
    /// The reserved "no object" handle
    pub const NONE: ObjectHandle = ObjectHandle(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Fixed-capacity sparse set keyed by `ObjectHandle`
#[derive(Debug, Clone)]
pub struct ObjectRegistry<T> {
    /// handle -> dense index + 1 (0 = absent); length `capacity + 1`
    slot: Vec<u32>,
    /// dense index -> handle
    handles: Vec<ObjectHandle>,
    /// dense index -> object
    objects: Vec<T>,
    capacity: u32,
}

impl<T> ObjectRegistry<T> {
    /// Create a registry accepting handles `1..=capacity`
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            slot: vec![0; capacity as usize + 1],
            handles: Vec::with_capacity(capacity as usize),
            objects: Vec::with_capacity(capacity as usize),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of live objects
    #[inline]
    pub fn count(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[inline]
    fn slot_of(&self, handle: ObjectHandle) -> u32 {
        self.slot.get(handle.0 as usize).copied().unwrap_or(0)
    }

    #[inline]
    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.slot_of(handle) != 0
    }

    /// Register `obj` under `handle`. Fails for the reserved handle, handles
    /// beyond capacity, handles already present, or a full registry.
    pub fn add(&mut self, handle: ObjectHandle, obj: T) -> bool {
        if handle.is_none() || handle.0 > self.capacity {
            log::debug!("Registry rejected out-of-range handle {}", handle.0);
            return false;
        }
        if self.contains(handle) {
            log::debug!("Registry rejected duplicate handle {}", handle.0);
            return false;
        }
        if self.handles.len() >= self.capacity as usize {
            log::warn!("Registry full ({} objects)", self.capacity);
            return false;
        }
        self.handles.push(handle);
        self.objects.push(obj);
        self.slot[handle.0 as usize] = self.handles.len() as u32;
        true
    }

    /// Unregister `handle`, returning its object. The last dense entry is moved
    /// into the vacated position.
    pub fn take(&mut self, handle: ObjectHandle) -> Option<T> {
        let j = self.slot_of(handle);
        if j == 0 {
            return None;
        }
        let index = (j - 1) as usize;
        self.handles.swap_remove(index);
        let obj = self.objects.swap_remove(index);
        if let Some(&moved) = self.handles.get(index) {
            self.slot[moved.0 as usize] = j;
        }
        self.slot[handle.0 as usize] = 0;
        Some(obj)
    }

    /// Unregister `handle`; `false` if it was not present
    pub fn remove(&mut self, handle: ObjectHandle) -> bool {
        self.take(handle).is_some()
    }

    /// Drop every object (capacity is kept)
    pub fn clear(&mut self) {
        for h in self.handles.drain(..) {
            self.slot[h.0 as usize] = 0;
        }
        self.objects.clear();
    }

    /// Object at dense position `i` (`0 <= i < count`)
    #[inline]
    pub fn at(&self, i: usize) -> Option<&T> {
        self.objects.get(i)
    }

    /// Handle at dense position `i`
    #[inline]
    pub fn handle_at(&self, i: usize) -> Option<ObjectHandle> {
        self.handles.get(i).copied()
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&T> {
        match self.slot_of(handle) {
            0 => None,
            j => self.objects.get(j as usize - 1),
        }
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut T> {
        match self.slot_of(handle) {
            0 => None,
            j => self.objects.get_mut(j as usize - 1),
        }
    }

    /// Dense handles, in iteration order
    #[inline]
    pub fn handles(&self) -> &[ObjectHandle] {
        &self.handles
    }

    /// Dense iteration over `(handle, object)`
    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &T)> {
        self.handles.iter().copied().zip(self.objects.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ObjectHandle, &mut T)> {
        self.handles.iter().copied().zip(self.objects.iter_mut())
    }

    /// Check the slot/dense cross-references. Used by tests and debug builds.
    pub fn validate(&self) -> bool {
        if self.handles.len() != self.objects.len() {
            return false;
        }
        let dense_ok = self
            .handles
            .iter()
            .enumerate()
            .all(|(i, h)| self.slot_of(*h) as usize == i + 1);
        let live_slots = self.slot.iter().filter(|&&j| j != 0).count();
        let slots_ok = self.slot.iter().enumerate().all(|(h, &j)| {
            j == 0
                || (j as usize <= self.handles.len()
                    && self.handles[j as usize - 1].0 as usize == h)
        });
        dense_ok && slots_ok && live_slots == self.handles.len() && self.slot[0] == 0
    }
}
