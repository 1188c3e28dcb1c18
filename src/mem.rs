//! The block pool and everything that is required to configure and inspect it.

use crate::unit;
use core::fmt;

/// The size of the pool that is used if no other size is configured.
pub const HEAP_SIZE: usize = 4096;

pub mod block;
pub mod buddy;
pub mod iter;

mod chain;

pub use block::{BlockHandle, BlockInfo, BlockState};
pub use buddy::BuddyPool;
pub use iter::{Blocks, FreeBlocks};

/// Decides which pairs of neighbouring free blocks may be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Merge any two address-adjacent free blocks of equal size.
    Adjacent,
    /// Only merge real buddies: the lower block must start at a multiple
    /// of twice its size.
    Aligned,
}

impl Default for MergePolicy {
    fn default() -> Self {
        MergePolicy::Adjacent
    }
}

/// Configuration for a [`BuddyPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// The name that is shown in the [`AllocStats`].
    pub name: &'static str,
    /// The number of address units managed by the pool.
    ///
    /// Must be a non-zero power of two.
    pub size: usize,
    /// Decides which neighbouring free blocks may be merged.
    pub merge_policy: MergePolicy,
}

impl PoolConfig {
    /// Create the default configuration for a pool of `size` units.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "Buddy Pool",
            size: HEAP_SIZE,
            merge_policy: MergePolicy::default(),
        }
    }
}

/// Statistics for a [`BuddyPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocStats {
    /// The name of the pool that collected these stats.
    pub name: &'static str,
    /// The sum of the sizes that were requested for the live allocations.
    pub requested: usize,
    /// The sum of the rounded sizes of the live allocations.
    pub allocated: usize,
    /// The number of units that are left for allocation.
    pub free: usize,
    /// The total number of units that this pool manages.
    pub total: usize,
    /// The number of blocks in the address chain.
    pub blocks: usize,
    /// The number of blocks in the free chain.
    pub free_blocks: usize,
}

impl AllocStats {
    /// Create a new [`AllocStats`] instance for the given pool name.
    pub const fn with_name(name: &'static str) -> Self {
        Self {
            name,
            requested: 0,
            allocated: 0,
            free: 0,
            total: 0,
            blocks: 0,
            free_blocks: 0,
        }
    }
}

impl fmt::Display for AllocStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        self.name.chars().try_for_each(|_| write!(f, "~"))?;
        writeln!(f, "\nRequested: {}", unit::bytes(self.requested))?;
        writeln!(f, "Allocated: {}", unit::bytes(self.allocated))?;
        writeln!(f, "Free:      {}", unit::bytes(self.free))?;
        writeln!(f, "Total:     {}", unit::bytes(self.total))?;
        writeln!(f, "Blocks:    {} ({} free)", self.blocks, self.free_blocks)?;
        self.name.chars().try_for_each(|_| write!(f, "~"))?;
        writeln!(f)?;
        Ok(())
    }
}
