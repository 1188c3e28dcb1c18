//! Block records and the arena that stores them.
//!
//! Both chains of the pool reference blocks by their index inside the
//! arena. Removing a block from one chain never releases its
//! record; only a merge gives a record back to the arena.

use crate::error::{Error, Result};
use core::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Source of the ids that tie handles to the arena that issued them.
static NEXT_ARENA_ID: AtomicUsize = AtomicUsize::new(0);

/// Whether a block is available for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// The block is in the free chain and can be handed out.
    Free,
    /// The block was handed out and is waiting to be deallocated.
    Allocated,
}

impl BlockState {
    /// Returns `true` if this is [`BlockState::Free`].
    pub fn is_free(self) -> bool {
        self == BlockState::Free
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockState::Free => f.write_str("Free"),
            BlockState::Allocated => f.write_str("Alloc"),
        }
    }
}

/// Opaque reference to a block returned by an allocation.
///
/// A handle stays valid until the block it names is destroyed by a merge.
/// The generation makes sure a handle to a destroyed block is rejected, even
/// if the arena slot was reused for another block in the meantime, and the
/// arena id makes sure a handle is only accepted by the pool that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    pub(crate) arena: usize,
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

/// A snapshot of a single block, as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// The start of the block inside the managed range.
    pub offset: usize,
    /// The number of address units this block spans.
    pub size: usize,
    /// Whether the block is free or allocated.
    pub state: BlockState,
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} | Size: {}]", self.state, self.size)
    }
}

/// A single block record.
///
/// `next` forms the address chain, `prev_free`/`next_free` the free chain.
/// The free links are `None` while the block is allocated.
#[derive(Debug, Clone)]
pub(crate) struct Block {
    pub offset: usize,
    pub size: usize,
    pub state: BlockState,
    /// The size the caller asked for, only meaningful while allocated.
    pub requested: usize,
    pub next: Option<usize>,
    pub prev_free: Option<usize>,
    pub next_free: Option<usize>,
}

impl Block {
    /// Create a new free block that is not linked into any chain.
    pub fn free(offset: usize, size: usize) -> Self {
        Self {
            offset,
            size,
            state: BlockState::Free,
            requested: 0,
            next: None,
            prev_free: None,
            next_free: None,
        }
    }

    pub fn info(&self) -> BlockInfo {
        BlockInfo {
            offset: self.offset,
            size: self.size,
            state: self.state,
        }
    }
}

#[derive(Debug)]
enum Entry {
    Occupied(Block),
    Vacant { next_vacant: Option<usize> },
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Entry,
}

/// Indexable storage for block records.
///
/// Released slots are threaded into a vacant list and reused by the next
/// insertion, so releasing a record never allocates.
#[derive(Debug)]
pub(crate) struct BlockArena {
    id: usize,
    slots: Vec<Slot>,
    vacant_head: Option<usize>,
    vacant_len: usize,
    len: usize,
}

impl BlockArena {
    pub fn new() -> Self {
        Self {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            vacant_head: None,
            vacant_len: 0,
            len: 0,
        }
    }

    /// The number of live block records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Makes sure the next `additional` insertions succeed without
    /// requesting more memory.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let missing = additional.saturating_sub(self.vacant_len);
        self.slots
            .try_reserve(missing)
            .map_err(|_| Error::OutOfMetadata)
    }

    /// Stores `block` and returns its index.
    pub fn insert(&mut self, block: Block) -> Result<usize> {
        self.len += 1;

        if let Some(idx) = self.vacant_head {
            let slot = &mut self.slots[idx];
            self.vacant_head = match slot.entry {
                Entry::Vacant { next_vacant } => next_vacant,
                Entry::Occupied(_) => unreachable!("occupied slot in vacant list"),
            };
            self.vacant_len -= 1;
            slot.entry = Entry::Occupied(block);
            return Ok(idx);
        }

        if let Err(err) = self.reserve(1) {
            self.len -= 1;
            return Err(err);
        }

        self.slots.push(Slot {
            generation: 0,
            entry: Entry::Occupied(block),
        });
        Ok(self.slots.len() - 1)
    }

    /// Releases the record at `idx` and returns it.
    ///
    /// Every handle to the released block becomes invalid.
    pub fn remove(&mut self, idx: usize) -> Block {
        let slot = &mut self.slots[idx];
        let entry = core::mem::replace(
            &mut slot.entry,
            Entry::Vacant {
                next_vacant: self.vacant_head,
            },
        );

        match entry {
            Entry::Occupied(block) => {
                slot.generation = slot.generation.wrapping_add(1);
                self.vacant_head = Some(idx);
                self.vacant_len += 1;
                self.len -= 1;
                block
            }
            Entry::Vacant { .. } => panic!("tried to remove vacant block slot {}", idx),
        }
    }

    pub fn get(&self, idx: usize) -> &Block {
        match &self.slots[idx].entry {
            Entry::Occupied(block) => block,
            Entry::Vacant { .. } => panic!("block slot {} is vacant", idx),
        }
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Block {
        match &mut self.slots[idx].entry {
            Entry::Occupied(block) => block,
            Entry::Vacant { .. } => panic!("block slot {} is vacant", idx),
        }
    }

    /// Starts a new generation for the live block at `idx` and returns a
    /// handle for it.
    ///
    /// Called whenever a block is handed out, so a handle from an earlier
    /// allocation of the same record is never accepted again.
    pub fn renew(&mut self, idx: usize) -> BlockHandle {
        let slot = &mut self.slots[idx];
        slot.generation = slot.generation.wrapping_add(1);
        BlockHandle {
            arena: self.id,
            index: idx,
            generation: slot.generation,
        }
    }

    /// Resolves a handle to the index of the block it names, if that block
    /// is still alive. Handles issued by another arena are never resolved.
    pub fn resolve(&self, handle: BlockHandle) -> Option<usize> {
        if handle.arena != self.id {
            return None;
        }

        let slot = self.slots.get(handle.index)?;
        match slot.entry {
            Entry::Occupied(_) if slot.generation == handle.generation => Some(handle.index),
            _ => None,
        }
    }
}
