//! Iterators over the chains of a [`BuddyPool`](super::BuddyPool).

use super::{block::BlockInfo, chain::BlockChain};
use core::iter::FusedIterator;

/// Iterator over every block of a pool in address order.
///
/// Created by [`BuddyPool::blocks`](super::BuddyPool::blocks). Every call
/// to `blocks` starts over at the head of the chain.
#[derive(Clone)]
pub struct Blocks<'pool> {
    chain: &'pool BlockChain,
    current: Option<usize>,
}

impl<'pool> Blocks<'pool> {
    pub(crate) fn new(chain: &'pool BlockChain) -> Self {
        Self {
            chain,
            current: chain.head(),
        }
    }
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.current?;
        self.current = self.chain.next(idx);
        Some(self.chain.block(idx).info())
    }
}

impl FusedIterator for Blocks<'_> {}

/// Iterator over the free blocks of a pool in free chain order.
///
/// Created by [`BuddyPool::free_blocks`](super::BuddyPool::free_blocks).
#[derive(Clone)]
pub struct FreeBlocks<'pool> {
    chain: &'pool BlockChain,
    current: Option<usize>,
}

impl<'pool> FreeBlocks<'pool> {
    pub(crate) fn new(chain: &'pool BlockChain) -> Self {
        Self {
            chain,
            current: chain.free_head(),
        }
    }
}

impl Iterator for FreeBlocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.current?;
        self.current = self.chain.next_free(idx);
        Some(self.chain.block(idx).info())
    }
}

impl FusedIterator for FreeBlocks<'_> {}
