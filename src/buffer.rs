use std::mem;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::pool::MemPool;

/// Output-block ownership protocol shared by every codec.
///
/// Each transform call goes through [`BlockBuffer::prepare`] to obtain a
/// writable block and [`BlockBuffer::commit`] to hand the produced bytes
/// back to the caller as an immutable [`Bytes`] handle.
///
/// With reuse enabled, the buffer retains the last committed block and takes
/// it back for the next call only when every caller handle to it has been
/// dropped. When a call needs more capacity than held, or a caller still
/// references the old block, the old block is retired rather than freed:
/// the retired slot and the caller's own handles keep it alive, so bytes
/// returned from a prior call are never invalidated by growth.
///
/// With reuse disabled, every call allocates a fresh block from the pool and
/// nothing is retained, so a caller may keep any number of outputs alive.
#[derive(Debug)]
pub(crate) struct BlockBuffer {
    pool: Arc<MemPool>,
    reuse_buffer: bool,
    buf: BytesMut,
    retired: Option<Bytes>,
}

impl BlockBuffer {
    pub(crate) fn new(pool: Arc<MemPool>, reuse_buffer: bool) -> BlockBuffer {
        BlockBuffer {
            pool,
            reuse_buffer,
            buf: BytesMut::new(),
            retired: None,
        }
    }

    /// Returns a zeroed writable block of exactly `len` bytes.
    ///
    /// May be called again before [`BlockBuffer::commit`] to grow during a
    /// single transform call; the partially written block is discarded and
    /// a larger one is produced.
    pub(crate) fn prepare(&mut self, len: usize) -> &mut [u8] {
        if self.reuse_buffer {
            if let Some(prev) = self.retired.take() {
                // Reclaim succeeds only once no caller still holds a view
                // of the previous block.
                if let Ok(reclaimed) = prev.try_into_mut() {
                    if reclaimed.capacity() >= len {
                        self.buf = reclaimed;
                    }
                }
            }
        }
        if !self.reuse_buffer || self.buf.capacity() < len {
            trace!(len, reuse = self.reuse_buffer, "allocating output block");
            self.buf = self.pool.allocate(len);
        }
        self.buf.clear();
        self.buf.resize(len, 0);
        &mut self.buf[..]
    }

    /// Freezes the first `written` bytes of the prepared block and returns
    /// them to the caller. The handle's length is the produced length.
    pub(crate) fn commit(&mut self, written: usize) -> Bytes {
        self.buf.truncate(written);
        let block = mem::take(&mut self.buf).freeze();
        if self.reuse_buffer {
            self.retired = Some(block.clone());
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(reuse: bool) -> (Arc<MemPool>, BlockBuffer) {
        let pool = Arc::new(MemPool::new());
        let buf = BlockBuffer::new(pool.clone(), reuse);
        (pool, buf)
    }

    #[test]
    fn commit_reports_written_length() {
        let (_pool, mut buf) = buffer(false);
        let out = buf.prepare(32);
        out[..3].copy_from_slice(b"abc");
        let block = buf.commit(3);
        assert_eq!(&block[..], b"abc");
    }

    #[test]
    fn reuse_reclaims_block_after_caller_drops() {
        let (pool, mut buf) = buffer(true);
        buf.prepare(64);
        drop(buf.commit(64));
        let allocations = pool.allocation_count();
        buf.prepare(64);
        buf.commit(64);
        assert_eq!(pool.allocation_count(), allocations);
    }

    #[test]
    fn growth_leaves_held_block_intact() {
        let (_pool, mut buf) = buffer(true);
        let out = buf.prepare(8);
        out.copy_from_slice(b"first!!!");
        let first = buf.commit(8);

        let out = buf.prepare(1024);
        out[..6].copy_from_slice(b"second");
        let second = buf.commit(6);

        assert_eq!(&first[..], b"first!!!");
        assert_eq!(&second[..], b"second");
    }

    #[test]
    fn no_reuse_allocates_fresh_every_call() {
        let (pool, mut buf) = buffer(false);
        buf.prepare(16);
        let a = buf.commit(16);
        buf.prepare(16);
        let b = buf.commit(16);
        drop((a, b));
        assert_eq!(pool.allocation_count(), 2);
    }
}
