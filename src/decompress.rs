use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use bzip2::{Decompress as BzDecompress, Status as BzStatus};
use flate2::read::MultiGzDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use snap::raw::{decompress_len, Decoder};
use tracing::trace;

use crate::buffer::BlockBuffer;
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::pool::MemPool;

/// Starting output size when the caller does not know it. Wrong guesses
/// are handled by doubling and re-running the block.
fn initial_guess(input_len: usize) -> usize {
    input_len.saturating_mul(4).max(4096)
}

fn read_be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Deflate decompressor serving both the Gzip and Default kinds.
///
/// The framing is detected per block from the gzip magic, so a single
/// instance transparently handles gzip members and raw deflate streams.
#[derive(Debug)]
pub struct GzipDecompressor {
    buffer: BlockBuffer,
    ctx: Option<Decompress>,
}

impl GzipDecompressor {
    pub(crate) fn new(pool: Arc<MemPool>, reuse_buffer: bool) -> GzipDecompressor {
        GzipDecompressor {
            buffer: BlockBuffer::new(pool, reuse_buffer),
            ctx: None,
        }
    }

    /// Inflates one or more gzip members into `out`. Returns the produced
    /// length, or `None` if `out` filled before the stream ended.
    fn inflate_gzip(input: &[u8], out: &mut [u8]) -> CodecResult<Option<usize>> {
        let mut decoder = MultiGzDecoder::new(input);
        let mut pos = 0;
        while pos < out.len() {
            let n = decoder
                .read(&mut out[pos..])
                .map_err(|e| CodecError::ProcessingFailure(format!("gzip inflate failed: {e}")))?;
            if n == 0 {
                return Ok(Some(pos));
            }
            pos += n;
        }
        // Buffer is full; probe whether the stream has more to give.
        let mut probe = [0u8; 1];
        let n = decoder
            .read(&mut probe)
            .map_err(|e| CodecError::ProcessingFailure(format!("gzip inflate failed: {e}")))?;
        if n == 0 {
            Ok(Some(pos))
        } else {
            Ok(None)
        }
    }

    /// Inflates a raw deflate stream into `out`.
    fn inflate_raw(ctx: &mut Decompress, input: &[u8], out: &mut [u8]) -> CodecResult<Option<usize>> {
        ctx.reset(false);
        let mut consumed = 0;
        let mut pos = 0;
        loop {
            let before_in = ctx.total_in();
            let before_out = ctx.total_out();
            let status = ctx
                .decompress(&input[consumed..], &mut out[pos..], FlushDecompress::Finish)
                .map_err(|e| {
                    CodecError::ProcessingFailure(format!("deflate inflate failed: {e}"))
                })?;
            consumed += (ctx.total_in() - before_in) as usize;
            pos += (ctx.total_out() - before_out) as usize;
            let progressed = ctx.total_in() > before_in || ctx.total_out() > before_out;
            match status {
                Status::StreamEnd => return Ok(Some(pos)),
                Status::Ok | Status::BufError if pos == out.len() => return Ok(None),
                Status::Ok if progressed => continue,
                Status::Ok | Status::BufError => {
                    return Err(CodecError::ProcessingFailure(
                        "truncated or corrupt deflate stream".into(),
                    ))
                }
            }
        }
    }
}

impl Codec for GzipDecompressor {
    fn init(&mut self) -> CodecResult<()> {
        // Raw deflate context; gzip members go through a per-block reader
        // that also verifies the trailer checksum.
        self.ctx = Some(Decompress::new(false));
        Ok(())
    }

    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes> {
        let is_gzip = input.len() >= 2 && input[0] == 0x1f && input[1] == 0x8b;
        let mut guess = if output_length > 0 {
            output_length
        } else {
            initial_guess(input.len())
        };
        loop {
            let fit = if is_gzip {
                Self::inflate_gzip(input, self.buffer.prepare(guess))?
            } else {
                let ctx = self.ctx.as_mut().ok_or_else(|| {
                    CodecError::ProcessingFailure(
                        "gzip decompressor used before initialization".into(),
                    )
                })?;
                Self::inflate_raw(ctx, input, self.buffer.prepare(guess))?
            };
            match fit {
                Some(written) => {
                    if output_length > 0 && written != output_length {
                        return Err(CodecError::ProcessingFailure(format!(
                            "produced {written} bytes but caller declared {output_length}"
                        )));
                    }
                    return Ok(self.buffer.commit(written));
                }
                None if output_length > 0 => {
                    return Err(CodecError::ProcessingFailure(
                        "caller-declared output size too small for stream".into(),
                    ))
                }
                None => {
                    trace!(guess, "growing decompression output block");
                    guess *= 2;
                }
            }
        }
    }
}

/// Bzip2 decompressor. The bzlib context is per block.
#[derive(Debug)]
pub struct Bzip2Decompressor {
    buffer: BlockBuffer,
}

impl Bzip2Decompressor {
    pub(crate) fn new(pool: Arc<MemPool>, reuse_buffer: bool) -> Bzip2Decompressor {
        Bzip2Decompressor {
            buffer: BlockBuffer::new(pool, reuse_buffer),
        }
    }

    fn inflate(input: &[u8], out: &mut [u8]) -> CodecResult<Option<usize>> {
        let mut ctx = BzDecompress::new(false);
        let mut consumed = 0;
        let mut pos = 0;
        loop {
            let before_in = ctx.total_in();
            let before_out = ctx.total_out();
            let status = ctx
                .decompress(&input[consumed..], &mut out[pos..])
                .map_err(|e| {
                    CodecError::ProcessingFailure(format!("bzip2 decompress failed: {e}"))
                })?;
            consumed += (ctx.total_in() - before_in) as usize;
            pos += (ctx.total_out() - before_out) as usize;
            let progressed = ctx.total_in() > before_in || ctx.total_out() > before_out;
            match status {
                BzStatus::StreamEnd => return Ok(Some(pos)),
                _ if pos == out.len() => return Ok(None),
                _ if progressed => continue,
                _ => {
                    return Err(CodecError::ProcessingFailure(
                        "truncated or corrupt bzip2 stream".into(),
                    ))
                }
            }
        }
    }
}

impl Codec for Bzip2Decompressor {
    fn init(&mut self) -> CodecResult<()> {
        Ok(())
    }

    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes> {
        let mut guess = if output_length > 0 {
            output_length
        } else {
            initial_guess(input.len())
        };
        loop {
            match Self::inflate(input, self.buffer.prepare(guess))? {
                Some(written) => {
                    if output_length > 0 && written != output_length {
                        return Err(CodecError::ProcessingFailure(format!(
                            "produced {written} bytes but caller declared {output_length}"
                        )));
                    }
                    return Ok(self.buffer.commit(written));
                }
                None if output_length > 0 => {
                    return Err(CodecError::ProcessingFailure(
                        "caller-declared output size too small for stream".into(),
                    ))
                }
                None => {
                    trace!(guess, "growing decompression output block");
                    guess *= 2;
                }
            }
        }
    }
}

/// Raw snappy decompressor. The exact output size comes from the snappy
/// length preamble, so no growth is ever needed.
#[derive(Debug)]
pub struct SnappyDecompressor {
    buffer: BlockBuffer,
    decoder: Decoder,
}

impl SnappyDecompressor {
    pub(crate) fn new(pool: Arc<MemPool>, reuse_buffer: bool) -> SnappyDecompressor {
        SnappyDecompressor {
            buffer: BlockBuffer::new(pool, reuse_buffer),
            decoder: Decoder::new(),
        }
    }
}

impl Codec for SnappyDecompressor {
    fn init(&mut self) -> CodecResult<()> {
        Ok(())
    }

    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes> {
        let exact = decompress_len(input).map_err(|e| {
            CodecError::ProcessingFailure(format!("snappy length preamble invalid: {e}"))
        })?;
        let needed = if output_length > 0 { output_length } else { exact };
        let out = self.buffer.prepare(needed);
        let written = self.decoder.decompress(input, out).map_err(|e| {
            CodecError::ProcessingFailure(format!("snappy decompress failed: {e}"))
        })?;
        if output_length > 0 && written != output_length {
            return Err(CodecError::ProcessingFailure(format!(
                "produced {written} bytes but caller declared {output_length}"
            )));
        }
        Ok(self.buffer.commit(written))
    }
}

/// Decompressor for snappy with per-block length framing, mirroring
/// [`crate::SnappyBlockCompressor`]'s layout.
#[derive(Debug)]
pub struct SnappyBlockDecompressor {
    buffer: BlockBuffer,
    decoder: Decoder,
}

impl SnappyBlockDecompressor {
    pub(crate) fn new(pool: Arc<MemPool>, reuse_buffer: bool) -> SnappyBlockDecompressor {
        SnappyBlockDecompressor {
            buffer: BlockBuffer::new(pool, reuse_buffer),
            decoder: Decoder::new(),
        }
    }
}

impl Codec for SnappyBlockDecompressor {
    fn init(&mut self) -> CodecResult<()> {
        Ok(())
    }

    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes> {
        if input.len() < 4 {
            return Err(CodecError::ProcessingFailure(
                "truncated snappy block header".into(),
            ));
        }
        let total = read_be_u32(input) as usize;
        if output_length > 0 && output_length != total {
            return Err(CodecError::ProcessingFailure(format!(
                "caller declared {output_length} bytes but block header promises {total}"
            )));
        }
        let out = self.buffer.prepare(total);

        let mut pos = 0;
        let mut off = 4;
        while off < input.len() {
            if input.len() - off < 4 {
                return Err(CodecError::ProcessingFailure(
                    "truncated snappy chunk header".into(),
                ));
            }
            let chunk_len = read_be_u32(&input[off..]) as usize;
            off += 4;
            if chunk_len > input.len() - off {
                return Err(CodecError::ProcessingFailure(
                    "snappy chunk length exceeds input block".into(),
                ));
            }
            let written = self
                .decoder
                .decompress(&input[off..off + chunk_len], &mut out[pos..])
                .map_err(|e| {
                    CodecError::ProcessingFailure(format!("snappy decompress failed: {e}"))
                })?;
            pos += written;
            off += chunk_len;
        }

        if pos != total {
            return Err(CodecError::ProcessingFailure(format!(
                "block header promised {total} bytes but chunks produced {pos}"
            )));
        }
        Ok(self.buffer.commit(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::GzipCompressor;

    fn pool() -> Arc<MemPool> {
        Arc::new(MemPool::new())
    }

    #[test]
    fn one_decompressor_handles_both_deflate_framings() {
        let input = b"the same bytes under two framings".to_vec();
        let mut framed = GzipCompressor::new(pool(), false, true);
        framed.init().unwrap();
        let mut raw = GzipCompressor::new(pool(), false, false);
        raw.init().unwrap();

        let mut codec = GzipDecompressor::new(pool(), false);
        codec.init().unwrap();

        let gzip_block = framed.process_block(&input, 0).unwrap();
        let deflate_block = raw.process_block(&input, 0).unwrap();
        assert_eq!(&codec.process_block(&gzip_block, 0).unwrap()[..], &input[..]);
        assert_eq!(
            &codec.process_block(&deflate_block, 0).unwrap()[..],
            &input[..]
        );
    }

    #[test]
    fn corrupt_deflate_stream_is_a_processing_failure() {
        let mut codec = GzipDecompressor::new(pool(), false);
        codec.init().unwrap();
        let err = codec.process_block(&[0x07, 0xff, 0xff, 0xff], 0).unwrap_err();
        assert!(matches!(err, CodecError::ProcessingFailure(_)));
    }

    #[test]
    fn truncated_snappy_block_is_a_processing_failure() {
        let mut codec = SnappyBlockDecompressor::new(pool(), false);
        codec.init().unwrap();
        let err = codec.process_block(&[0, 0], 0).unwrap_err();
        assert!(matches!(err, CodecError::ProcessingFailure(_)));
        // Header promises bytes the chunks never deliver.
        let err = codec.process_block(&[0, 0, 0, 9], 0).unwrap_err();
        assert!(matches!(err, CodecError::ProcessingFailure(_)));
    }
}
