//! A buddy allocator that manages an abstract, fixed-size address range.
//!
//! The range is split into power-of-two sized blocks. Allocations round the
//! requested size up to the next power of two and recursively halve the first
//! free block that is large enough. Deallocations give a block back and merge
//! neighbouring free blocks of the same size into larger ones.
//!
//! The allocator only does the bookkeeping: an allocation returns a
//! [`BlockHandle`] whose [`BlockInfo`] describes an `offset` and a `size`
//! inside the managed range, it never hands out real memory.
//!
//! ```
//! use buddy_heap::{BlockState, BuddyPool};
//!
//! let mut pool = BuddyPool::new(4096)?;
//! let block = pool.allocate(200)?;
//! assert_eq!(pool.block(block).unwrap().size, 256);
//!
//! pool.deallocate(block)?;
//! let blocks = pool.blocks().collect::<Vec<_>>();
//! assert_eq!(blocks.len(), 1);
//! assert_eq!(blocks[0].state, BlockState::Free);
//! # Ok::<(), buddy_heap::Error>(())
//! ```
#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]

pub mod error;
pub mod mem;
pub mod print;
pub mod unit;

pub use error::{Error, Result};
pub use mem::{
    AllocStats, BlockHandle, BlockInfo, BlockState, Blocks, BuddyPool, FreeBlocks, MergePolicy,
    PoolConfig, HEAP_SIZE,
};
