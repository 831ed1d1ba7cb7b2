use std::sync::Arc;

use bytes::Bytes;
use bzip2::{Action, Compress as BzCompress, Compression as BzCompression, Status as BzStatus};
use flate2::{Compress, Compression, Crc, FlushCompress, Status};
use snap::raw::{max_compress_len, Encoder};

use crate::buffer::BlockBuffer;
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::pool::MemPool;

/// Fixed gzip member header: magic, deflate method, no flags, no mtime,
/// unknown OS.
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff];

/// CRC32 + ISIZE.
const GZIP_TRAILER_LEN: usize = 8;

/// Chunk size for per-block snappy framing.
const SNAPPY_BLOCK_SIZE: usize = 256 * 1024;

/// Worst-case deflate output for `len` input bytes (zlib's compressBound).
fn deflate_bound(len: usize) -> usize {
    len + (len >> 12) + (len >> 14) + (len >> 25) + 13
}

/// Deflate compressor, optionally wrapped in the standard gzip container.
///
/// The framed flag is the only difference between the Gzip and Default
/// kinds; the underlying algorithm is the same.
#[derive(Debug)]
pub struct GzipCompressor {
    buffer: BlockBuffer,
    framed: bool,
    ctx: Option<Compress>,
}

impl GzipCompressor {
    pub(crate) fn new(pool: Arc<MemPool>, reuse_buffer: bool, framed: bool) -> GzipCompressor {
        GzipCompressor {
            buffer: BlockBuffer::new(pool, reuse_buffer),
            framed,
            ctx: None,
        }
    }
}

impl Codec for GzipCompressor {
    fn init(&mut self) -> CodecResult<()> {
        // Raw deflate; the gzip container, when requested, is written
        // around the stream by process_block.
        self.ctx = Some(Compress::new(Compression::default(), false));
        Ok(())
    }

    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes> {
        let ctx = self.ctx.as_mut().ok_or_else(|| {
            CodecError::ProcessingFailure("gzip compressor used before initialization".into())
        })?;
        let overhead = if self.framed {
            GZIP_HEADER.len() + GZIP_TRAILER_LEN
        } else {
            0
        };
        let needed = if output_length > 0 {
            output_length
        } else {
            deflate_bound(input.len()) + overhead
        };
        if needed < overhead {
            return Err(CodecError::ProcessingFailure(
                "declared output size smaller than the gzip framing".into(),
            ));
        }
        let out = self.buffer.prepare(needed);

        let mut pos = 0;
        if self.framed {
            out[..GZIP_HEADER.len()].copy_from_slice(&GZIP_HEADER);
            pos = GZIP_HEADER.len();
        }
        let deflate_end = needed - if self.framed { GZIP_TRAILER_LEN } else { 0 };

        ctx.reset();
        let mut consumed = 0;
        loop {
            let before_in = ctx.total_in();
            let before_out = ctx.total_out();
            let status = ctx
                .compress(
                    &input[consumed..],
                    &mut out[pos..deflate_end],
                    FlushCompress::Finish,
                )
                .map_err(|e| CodecError::ProcessingFailure(format!("deflate failed: {e}")))?;
            consumed += (ctx.total_in() - before_in) as usize;
            pos += (ctx.total_out() - before_out) as usize;
            match status {
                Status::StreamEnd => break,
                Status::Ok if pos < deflate_end => continue,
                Status::Ok | Status::BufError => {
                    return Err(CodecError::ProcessingFailure(
                        "output block too small for deflate stream".into(),
                    ))
                }
            }
        }

        if self.framed {
            let mut crc = Crc::new();
            crc.update(input);
            out[pos..pos + 4].copy_from_slice(&crc.sum().to_le_bytes());
            pos += 4;
            out[pos..pos + 4].copy_from_slice(&(input.len() as u32).to_le_bytes());
            pos += 4;
        }

        if output_length > 0 && pos != output_length {
            return Err(CodecError::ProcessingFailure(format!(
                "produced {pos} bytes but caller declared {output_length}"
            )));
        }
        Ok(self.buffer.commit(pos))
    }
}

/// Bzip2 compressor. The bzlib context is per block, so init has nothing
/// to allocate.
#[derive(Debug)]
pub struct Bzip2Compressor {
    buffer: BlockBuffer,
    level: BzCompression,
}

impl Bzip2Compressor {
    pub(crate) fn new(pool: Arc<MemPool>, reuse_buffer: bool) -> Bzip2Compressor {
        Bzip2Compressor {
            buffer: BlockBuffer::new(pool, reuse_buffer),
            level: BzCompression::best(),
        }
    }
}

impl Codec for Bzip2Compressor {
    fn init(&mut self) -> CodecResult<()> {
        Ok(())
    }

    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes> {
        // bzlib's documented worst case.
        let bound = input.len() + input.len() / 100 + 600;
        let needed = if output_length > 0 { output_length } else { bound };
        let out = self.buffer.prepare(needed);

        let mut ctx = BzCompress::new(self.level, 30);
        let mut consumed = 0;
        let mut pos = 0;
        loop {
            let before_in = ctx.total_in();
            let before_out = ctx.total_out();
            let status = ctx
                .compress(&input[consumed..], &mut out[pos..], Action::Finish)
                .map_err(|e| {
                    CodecError::ProcessingFailure(format!("bzip2 compress failed: {e}"))
                })?;
            consumed += (ctx.total_in() - before_in) as usize;
            pos += (ctx.total_out() - before_out) as usize;
            match status {
                BzStatus::StreamEnd => break,
                _ if pos == out.len() => {
                    return Err(CodecError::ProcessingFailure(
                        "output block too small for bzip2 stream".into(),
                    ))
                }
                _ => continue,
            }
        }

        if output_length > 0 && pos != output_length {
            return Err(CodecError::ProcessingFailure(format!(
                "produced {pos} bytes but caller declared {output_length}"
            )));
        }
        Ok(self.buffer.commit(pos))
    }
}

/// Raw snappy compressor, no internal block framing.
#[derive(Debug)]
pub struct SnappyCompressor {
    buffer: BlockBuffer,
    encoder: Encoder,
}

impl SnappyCompressor {
    pub(crate) fn new(pool: Arc<MemPool>, reuse_buffer: bool) -> SnappyCompressor {
        SnappyCompressor {
            buffer: BlockBuffer::new(pool, reuse_buffer),
            encoder: Encoder::new(),
        }
    }
}

impl Codec for SnappyCompressor {
    fn init(&mut self) -> CodecResult<()> {
        Ok(())
    }

    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes> {
        let bound = max_compress_len(input.len());
        let needed = if output_length > 0 { output_length } else { bound };
        let out = self.buffer.prepare(needed);
        let written = self
            .encoder
            .compress(input, out)
            .map_err(|e| CodecError::ProcessingFailure(format!("snappy compress failed: {e}")))?;
        if output_length > 0 && written != output_length {
            return Err(CodecError::ProcessingFailure(format!(
                "produced {written} bytes but caller declared {output_length}"
            )));
        }
        Ok(self.buffer.commit(written))
    }
}

/// Snappy compressor with per-block length framing.
///
/// Block layout: a big-endian u32 with the total uncompressed length,
/// then for each chunk of up to [`SNAPPY_BLOCK_SIZE`] input bytes a
/// big-endian u32 compressed length followed by the raw snappy bytes.
/// Every chunk carries its own snappy length preamble, so sub-blocks can
/// be decompressed independently.
#[derive(Debug)]
pub struct SnappyBlockCompressor {
    buffer: BlockBuffer,
    encoder: Encoder,
}

impl SnappyBlockCompressor {
    pub(crate) fn new(pool: Arc<MemPool>, reuse_buffer: bool) -> SnappyBlockCompressor {
        SnappyBlockCompressor {
            buffer: BlockBuffer::new(pool, reuse_buffer),
            encoder: Encoder::new(),
        }
    }
}

impl Codec for SnappyBlockCompressor {
    fn init(&mut self) -> CodecResult<()> {
        Ok(())
    }

    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes> {
        let mut bound = 4;
        for chunk in input.chunks(SNAPPY_BLOCK_SIZE) {
            bound += 4 + max_compress_len(chunk.len());
        }
        let needed = if output_length > 0 { output_length } else { bound };
        if needed < 4 {
            return Err(CodecError::ProcessingFailure(
                "declared output size smaller than the block header".into(),
            ));
        }
        let out = self.buffer.prepare(needed);

        out[..4].copy_from_slice(&(input.len() as u32).to_be_bytes());
        let mut pos = 4;
        for chunk in input.chunks(SNAPPY_BLOCK_SIZE) {
            if out.len() < pos + 4 {
                return Err(CodecError::ProcessingFailure(
                    "output block too small for chunk header".into(),
                ));
            }
            let written = self.encoder.compress(chunk, &mut out[pos + 4..]).map_err(|e| {
                CodecError::ProcessingFailure(format!("snappy compress failed: {e}"))
            })?;
            out[pos..pos + 4].copy_from_slice(&(written as u32).to_be_bytes());
            pos += 4 + written;
        }

        if output_length > 0 && pos != output_length {
            return Err(CodecError::ProcessingFailure(format!(
                "produced {pos} bytes but caller declared {output_length}"
            )));
        }
        Ok(self.buffer.commit(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Arc<MemPool> {
        Arc::new(MemPool::new())
    }

    #[test]
    fn gzip_output_carries_magic_and_trailer() {
        let mut codec = GzipCompressor::new(pool(), false, true);
        codec.init().unwrap();
        let input = vec![0u8; 100];
        let block = codec.process_block(&input, 0).unwrap();
        assert!(block.len() > GZIP_HEADER.len() + GZIP_TRAILER_LEN);
        assert_eq!(&block[..2], &[0x1f, 0x8b]);
        let isize_field = u32::from_le_bytes(block[block.len() - 4..].try_into().unwrap());
        assert_eq!(isize_field, 100);
    }

    #[test]
    fn raw_deflate_output_has_no_gzip_magic() {
        let mut codec = GzipCompressor::new(pool(), false, false);
        codec.init().unwrap();
        let block = codec.process_block(b"raw deflate block", 0).unwrap();
        assert!(!block.is_empty());
        assert_ne!(&block[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn uninitialized_gzip_compressor_reports_failure() {
        let mut codec = GzipCompressor::new(pool(), false, true);
        let err = codec.process_block(b"data", 0).unwrap_err();
        assert!(matches!(err, CodecError::ProcessingFailure(_)));
    }

    #[test]
    fn wrong_declared_output_size_fails() {
        let mut codec = SnappyCompressor::new(pool(), false);
        codec.init().unwrap();
        let err = codec.process_block(b"0123456789", 3).unwrap_err();
        assert!(matches!(err, CodecError::ProcessingFailure(_)));
    }

    #[test]
    fn snappy_block_framing_layout() {
        let mut codec = SnappyBlockCompressor::new(pool(), false);
        codec.init().unwrap();
        let input = vec![7u8; 5000];
        let block = codec.process_block(&input, 0).unwrap();
        let total = u32::from_be_bytes(block[..4].try_into().unwrap());
        assert_eq!(total as usize, input.len());
        let first_chunk_len = u32::from_be_bytes(block[4..8].try_into().unwrap()) as usize;
        assert_eq!(4 + 4 + first_chunk_len, block.len());
    }
}
