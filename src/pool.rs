use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::BytesMut;
use tracing::trace;

/// Accounting allocator for codec output blocks.
///
/// Grants block allocations without per-block release: a block's memory is
/// reference counted and lives as long as any [`bytes::Bytes`] handle to it,
/// so the pool only tracks how much it has handed out. Dropping the pool
/// releases the bookkeeping in bulk; outstanding handles keep their bytes.
///
/// Codecs hold the pool behind an `Arc`, so an instance can never outlive
/// the allocator it was bound to. Allocation uses atomics only and is safe
/// to call concurrently from independent codec instances.
#[derive(Debug, Default)]
pub struct MemPool {
    total_allocated: AtomicUsize,
    allocation_count: AtomicUsize,
}

impl MemPool {
    #[must_use]
    pub fn new() -> MemPool {
        MemPool::default()
    }

    /// Allocates a writable block with at least `len` bytes of capacity.
    pub fn allocate(&self, len: usize) -> BytesMut {
        self.total_allocated.fetch_add(len, Ordering::Relaxed);
        self.allocation_count.fetch_add(1, Ordering::Relaxed);
        trace!(len, "pool block allocation");
        BytesMut::with_capacity(len)
    }

    /// Total bytes handed out over the lifetime of the pool.
    #[must_use]
    pub fn total_allocated(&self) -> usize {
        self.total_allocated.load(Ordering::Relaxed)
    }

    /// Number of blocks handed out over the lifetime of the pool.
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.allocation_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_bytes_and_blocks() {
        let pool = MemPool::new();
        let a = pool.allocate(100);
        let b = pool.allocate(50);
        assert!(a.capacity() >= 100);
        assert!(b.capacity() >= 50);
        assert_eq!(pool.total_allocated(), 150);
        assert_eq!(pool.allocation_count(), 2);
    }

    #[test]
    fn blocks_outlive_the_pool() {
        let pool = MemPool::new();
        let mut block = pool.allocate(16);
        block.extend_from_slice(b"still readable");
        drop(pool);
        assert_eq!(&block[..], b"still readable");
    }
}
