//! Generational body storage
//!
//! Bodies are addressed by a [`BodyHandle`] made of a slot index and a
//! generation. Removing a body bumps the slot generation, so a stale handle
//! never aliases whatever body reuses the slot later.

use crate::body::RigidBody;
use core::fmt;

/// Stable reference to a body stored in a [`BodySet`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

impl BodyHandle {
    /// Create a handle from its raw parts
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack into a u64 (generation in the high half)
    #[inline]
    pub const fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Unpack from [`BodyHandle::to_bits`]
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyHandle({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    body: Option<RigidBody>,
}

/// Arena of rigid bodies with a free list
#[derive(Default)]
pub struct BodySet {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    len: usize,
}

impl BodySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a body and return its handle
    pub fn insert(&mut self, body: RigidBody) -> BodyHandle {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.body = Some(body);
            BodyHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                body: Some(body),
            });
            BodyHandle::new(index, 0)
        }
    }

    /// Remove a body, handing it back to the caller
    pub fn remove(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let body = slot.body.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.len -= 1;
        Some(body)
    }

    /// Whether the handle still refers to a live body
    #[inline]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Borrow a body
    #[inline]
    pub fn get(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.body.as_ref())
    }

    /// Mutably borrow a body
    #[inline]
    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.body.as_mut())
    }

    /// Mutably borrow two distinct bodies at once
    pub fn get_pair_mut(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
    ) -> Option<(&mut RigidBody, &mut RigidBody)> {
        if a.index == b.index || !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (ia, ib) = (a.index as usize, b.index as usize);
        let (first, second) = if ia < ib {
            let (lo, hi) = self.slots.split_at_mut(ib);
            (&mut lo[ia], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(ia);
            (&mut hi[0], &mut lo[ib])
        };
        Some((first.body.as_mut()?, second.body.as_mut()?))
    }

    /// Number of live bodies
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bodies are stored
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live bodies in slot order
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.body
                .as_ref()
                .map(|body| (BodyHandle::new(i as u32, slot.generation), body))
        })
    }

    /// Iterate mutably over live bodies in slot order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyHandle, &mut RigidBody)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.body
                .as_mut()
                .map(|body| (BodyHandle::new(i as u32, generation), body))
        })
    }

    /// Handles of all live bodies in slot order
    pub fn handles(&self) -> Vec<BodyHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}
