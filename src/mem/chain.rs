//! The address chain and the free chain.
//!
//! Both chains are linked through indices into the [`BlockArena`]. The
//! address chain always partitions the whole range. The free chain threads
//! the free blocks in the same relative order and is doubly linked, so a
//! block can be unlinked without searching for its predecessor.

use super::block::{Block, BlockArena, BlockHandle, BlockState};
use crate::error::Result;

#[derive(Debug)]
pub(crate) struct BlockChain {
    arena: BlockArena,
    head: Option<usize>,
    free_head: Option<usize>,
    free_tail: Option<usize>,
}

impl BlockChain {
    /// Create a chain that consists of a single free block of `size` units.
    pub fn new(size: usize) -> Result<Self> {
        let mut arena = BlockArena::new();
        let idx = arena.insert(Block::free(0, size))?;

        Ok(Self {
            arena,
            head: Some(idx),
            free_head: Some(idx),
            free_tail: Some(idx),
        })
    }

    /// The number of blocks in the address chain.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn resolve(&self, handle: BlockHandle) -> Option<usize> {
        self.arena.resolve(handle)
    }

    pub fn renew(&mut self, idx: usize) -> BlockHandle {
        self.arena.renew(idx)
    }

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    pub fn free_head(&self) -> Option<usize> {
        self.free_head
    }

    pub fn block(&self, idx: usize) -> &Block {
        self.arena.get(idx)
    }

    pub fn block_mut(&mut self, idx: usize) -> &mut Block {
        self.arena.get_mut(idx)
    }

    /// The block directly after `idx` in the address chain.
    pub fn next(&self, idx: usize) -> Option<usize> {
        self.arena.get(idx).next
    }

    /// The block after `idx` in the free chain.
    pub fn next_free(&self, idx: usize) -> Option<usize> {
        self.arena.get(idx).next_free
    }

    /// Reserve room for `count` splits, so none of them can fail halfway.
    pub fn reserve(&mut self, count: usize) -> Result<()> {
        self.arena.reserve(count)
    }

    /// Splits the free block `idx` in half.
    ///
    /// `idx` keeps the lower half, the upper half becomes a new free block that
    /// is inserted directly after `idx` in both chains. Returns the index of the
    /// new block.
    pub fn split(&mut self, idx: usize) -> Result<usize> {
        let (offset, size, next, next_free) = {
            let block = self.arena.get(idx);
            debug_assert!(block.state.is_free(), "only free blocks can be split");
            debug_assert!(block.size > 1, "a block of size 1 can not be split");
            (block.offset, block.size, block.next, block.next_free)
        };
        let half = size / 2;

        let mut buddy = Block::free(offset + half, half);
        buddy.next = next;
        buddy.prev_free = Some(idx);
        buddy.next_free = next_free;
        let buddy_idx = self.arena.insert(buddy)?;

        let block = self.arena.get_mut(idx);
        block.size = half;
        block.next = Some(buddy_idx);
        block.next_free = Some(buddy_idx);

        match next_free {
            Some(next_free) => self.arena.get_mut(next_free).prev_free = Some(buddy_idx),
            None => self.free_tail = Some(buddy_idx),
        }

        log::trace!("split block at {:#x} into two blocks of {}", offset, half);
        Ok(buddy_idx)
    }

    /// Merges the address successor of `idx` into `idx`.
    ///
    /// Both blocks must be free. `idx` doubles its size and takes over the
    /// successor's links; the successor's record is released.
    pub fn coalesce(&mut self, idx: usize) {
        let buddy_idx = self
            .arena
            .get(idx)
            .next
            .expect("coalesce requires an address successor");

        self.unlink_free(buddy_idx);

        let buddy = self.arena.remove(buddy_idx);
        debug_assert!(buddy.state.is_free(), "only free blocks can be merged");

        let block = self.arena.get_mut(idx);
        debug_assert!(block.state.is_free(), "only free blocks can be merged");
        block.size *= 2;
        block.next = buddy.next;
        let (offset, size) = (block.offset, block.size);

        log::trace!("merged blocks at {:#x} into a block of {}", offset, size);
    }

    /// Finds the first free block that follows `idx` in address order.
    pub fn next_free_by_address(&self, idx: usize) -> Option<usize> {
        let mut current = self.arena.get(idx).next;
        while let Some(next) = current {
            let block = self.arena.get(next);
            if block.state.is_free() {
                return Some(next);
            }
            current = block.next;
        }
        None
    }

    /// Links `idx` into the free chain directly before `next_free`,
    /// or at the end if `next_free` is `None`.
    pub fn link_free_before(&mut self, idx: usize, next_free: Option<usize>) {
        let prev_free = match next_free {
            Some(next) => self.arena.get(next).prev_free,
            None => self.free_tail,
        };

        let block = self.arena.get_mut(idx);
        block.prev_free = prev_free;
        block.next_free = next_free;

        match prev_free {
            Some(prev) => self.arena.get_mut(prev).next_free = Some(idx),
            None => self.free_head = Some(idx),
        }
        match next_free {
            Some(next) => self.arena.get_mut(next).prev_free = Some(idx),
            None => self.free_tail = Some(idx),
        }
    }

    /// Removes `idx` from the free chain and clears its free links.
    pub fn unlink_free(&mut self, idx: usize) {
        let block = self.arena.get_mut(idx);
        let prev_free = block.prev_free.take();
        let next_free = block.next_free.take();

        match prev_free {
            Some(prev) => self.arena.get_mut(prev).next_free = next_free,
            None => self.free_head = next_free,
        }
        match next_free {
            Some(next) => self.arena.get_mut(next).prev_free = prev_free,
            None => self.free_tail = prev_free,
        }
    }

    /// Changes the state of `idx` without touching any link.
    pub fn set_state(&mut self, idx: usize, state: BlockState) {
        self.arena.get_mut(idx).state = state;
    }
}
