//! Implementation of the block pool that hands out power-of-two sized blocks
//! of an abstract address range using the buddy algorithm.

use super::{
    block::{BlockHandle, BlockInfo, BlockState},
    chain::BlockChain,
    iter::{Blocks, FreeBlocks},
    AllocStats, MergePolicy, PoolConfig,
};
use crate::{
    error::{Error, Result},
    unit,
};

/// The central structure that is responsible for allocating blocks
/// using the buddy algorithm.
///
/// The pool keeps two chains over the same block records: the address chain
/// partitions the whole range in address order, and the free chain threads
/// only the free blocks, in the same relative order.
#[derive(Debug)]
pub struct BuddyPool {
    chain: BlockChain,
    config: PoolConfig,
    stats: AllocStats,
}

impl BuddyPool {
    /// Create a pool that manages `size` units with the default configuration.
    ///
    /// `size` must be a non-zero power of two.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(size))
    }

    /// Create a pool from the given configuration.
    ///
    /// The pool starts out as a single free block that spans the whole range.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        if !unit::is_power_of_two(config.size) {
            return Err(Error::InvalidPoolSize);
        }

        let chain = BlockChain::new(config.size)?;

        let mut stats = AllocStats::with_name(config.name);
        stats.total = config.size;
        stats.free = config.size;

        log::debug!(
            "created {} with {} units ({:?} merging)",
            config.name,
            config.size,
            config.merge_policy
        );

        Ok(Self {
            chain,
            config,
            stats,
        })
    }

    /// Allocates a block that can hold `size` units.
    ///
    /// The size is rounded up to the next power of two and the first free
    /// block that is large enough is split until it has exactly that size.
    /// If no free block is large enough, the pool stays untouched and
    /// [`Error::NoMemoryAvailable`] is returned.
    pub fn allocate(&mut self, size: usize) -> Result<BlockHandle> {
        if size == 0 {
            return Err(Error::ZeroSizedAllocation);
        }

        // a request that can't even be rounded will never fit
        let rounded = unit::round_up_pow2(size).ok_or(Error::NoMemoryAvailable)?;

        let idx = match self.find_free_block(rounded) {
            Some(idx) => idx,
            None => {
                log::debug!("no free block for a request of {} ({})", size, rounded);
                return Err(Error::NoMemoryAvailable);
            }
        };

        // every split halves the block and creates one new record, so
        // reserve all of them before touching any block.
        let splits = (self.chain.block(idx).size / rounded).trailing_zeros() as usize;
        self.chain.reserve(splits)?;

        // if this is how the block looks before the split:
        //
        // +--------------------------------+
        // |             `idx`              |
        // +--------------------------------+
        //
        // every split keeps the lower half in `idx` and creates the buddy
        // directly after it:
        //
        // +---------------------------------+
        // |     `idx`      |     buddy      |
        // +---------------------------------+
        while self.chain.block(idx).size > rounded {
            self.chain.split(idx)?;
        }

        self.chain.unlink_free(idx);
        let block = self.chain.block_mut(idx);
        block.state = BlockState::Allocated;
        block.requested = size;
        let offset = block.offset;

        self.alloc_stats(size, rounded);
        log::debug!(
            "allocated {} units at {:#x} for a request of {}",
            rounded,
            offset,
            size
        );

        Ok(self.chain.renew(idx))
    }

    /// Returns the first block in the free chain that can hold `size` units.
    fn find_free_block(&self, size: usize) -> Option<usize> {
        let mut current = self.chain.free_head();
        while let Some(idx) = current {
            if self.chain.block(idx).size >= size {
                return Some(idx);
            }
            current = self.chain.next_free(idx);
        }
        None
    }

    /// Gives the block named by `handle` back to the pool.
    ///
    /// The block is inserted into the free chain at its address position and
    /// afterwards all neighbouring free blocks of equal size are merged.
    ///
    /// A handle that does not name a live block of this pool is rejected with
    /// [`Error::InvalidHandle`], a handle to a block that is already free with
    /// [`Error::DoubleFree`]. In both cases the pool stays untouched.
    pub fn deallocate(&mut self, handle: BlockHandle) -> Result<()> {
        let idx = match self.chain.resolve(handle) {
            Some(idx) => idx,
            None => {
                log::warn!("tried to deallocate an unknown block {:?}", handle);
                return Err(Error::InvalidHandle);
            }
        };

        let block = self.chain.block(idx);
        if block.state.is_free() {
            log::warn!("tried to deallocate free block at {:#x}", block.offset);
            return Err(Error::DoubleFree);
        }
        let (offset, size, requested) = (block.offset, block.size, block.requested);

        self.chain.set_state(idx, BlockState::Free);

        // the free chain follows the address order, so the block belongs
        // right before the next free block after it.
        let next_free = self.chain.next_free_by_address(idx);
        self.chain.link_free_before(idx, next_free);

        self.dealloc_stats(requested, size);
        let merges = self.merge_free_blocks();
        log::debug!(
            "deallocated {} units at {:#x}, {} merges",
            size,
            offset,
            merges
        );

        Ok(())
    }

    /// Merges every pair of neighbouring free blocks that the merge policy
    /// allows to merge.
    ///
    /// A split can leave its buddy next to a free block of the same size, and
    /// those pairs stay apart until the next deallocation. Compacting merges
    /// them right away, so a failed allocation can be retried.
    ///
    /// Returns the number of merges that were performed.
    pub fn compact(&mut self) -> usize {
        self.merge_free_blocks()
    }

    /// Walks the address chain and merges neighbouring free blocks until no
    /// pair is left to merge.
    fn merge_free_blocks(&mut self) -> usize {
        let mut total = 0;

        // a merge can produce a block that now matches its predecessor,
        // so walk the chain again until a pass doesn't merge anything.
        loop {
            let mut merges = 0;
            let mut current = self.chain.head();

            while let Some(idx) = current {
                match self.chain.next(idx) {
                    // stay on `idx`, the larger block may match its new successor
                    Some(next) if self.can_merge(idx, next) => {
                        self.chain.coalesce(idx);
                        merges += 1;
                    }
                    next => current = next,
                }
            }

            if merges == 0 {
                break total;
            }
            total += merges;
        }
    }

    fn can_merge(&self, lower: usize, upper: usize) -> bool {
        let (lower, upper) = (self.chain.block(lower), self.chain.block(upper));

        let mergeable =
            lower.state.is_free() && upper.state.is_free() && lower.size == upper.size;

        mergeable
            && match self.config.merge_policy {
                MergePolicy::Adjacent => true,
                MergePolicy::Aligned => lower.offset % (lower.size * 2) == 0,
            }
    }

    /// Returns an iterator over all blocks in address order.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks::new(&self.chain)
    }

    /// Returns an iterator over the free blocks in free chain order.
    pub fn free_blocks(&self) -> FreeBlocks<'_> {
        FreeBlocks::new(&self.chain)
    }

    /// Returns a snapshot of the block named by `handle`, if it is still alive.
    pub fn block(&self, handle: BlockHandle) -> Option<BlockInfo> {
        self.chain
            .resolve(handle)
            .map(|idx| self.chain.block(idx).info())
    }

    /// The number of units managed by this pool.
    pub fn size(&self) -> usize {
        self.config.size
    }

    /// Returns the configuration this pool was created with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Return a copy of the statistics for this pool.
    pub fn stats(&self) -> AllocStats {
        let mut stats = self.stats.clone();
        stats.blocks = self.chain.len();
        stats.free_blocks = self.free_blocks().count();
        stats
    }

    fn alloc_stats(&mut self, requested: usize, size: usize) {
        self.stats.requested = self.stats.requested.saturating_add(requested);
        self.stats.allocated = self.stats.allocated.saturating_add(size);
        self.stats.free = self.stats.free.saturating_sub(size);
    }

    fn dealloc_stats(&mut self, requested: usize, size: usize) {
        self.stats.requested = self.stats.requested.saturating_sub(requested);
        self.stats.allocated = self.stats.allocated.saturating_sub(size);
        self.stats.free = self.stats.free.saturating_add(size);
    }
}
