//! Errors returned by the pool.

use displaydoc_lite::displaydoc;

/// Result for every pool operation.
pub type Result<T, E = Error> = core::result::Result<T, E>;

displaydoc! {
    /// Any error that can happen while creating a pool, allocating or deallocating.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Error {
        /// failed to obtain storage for a new block record.
        OutOfMetadata,
        /// the pool size must be a non-zero power of two.
        InvalidPoolSize,
        /// tried to allocate a block of size zero.
        ZeroSizedAllocation,
        /// tried to allocate, but there was no free block large enough.
        NoMemoryAvailable,
        /// the handle does not refer to a block of this pool.
        InvalidHandle,
        /// tried to deallocate a block that is already free.
        DoubleFree,
    }
}

impl Error {
    /// Returns whether this error leaves the pool unable to continue
    /// its current operation, as opposed to a rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::OutOfMetadata)
    }
}

impl std::error::Error for Error {}
