use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::compress::{Bzip2Compressor, GzipCompressor, SnappyBlockCompressor, SnappyCompressor};
use crate::decompress::{
    Bzip2Decompressor, GzipDecompressor, SnappyBlockDecompressor, SnappyDecompressor,
};
use crate::diagnostics::DiagnosticSink;
use crate::error::CodecResult;
use crate::kind::CompressionKind;
use crate::pool::MemPool;

/// The block-transform contract every codec satisfies.
///
/// An instance moves through Uninitialized → Initialized → Active: the
/// factory calls [`Codec::init`] before handing the instance out, and the
/// caller then invokes [`Codec::process_block`] repeatedly until done. An
/// instance whose initialization failed must be dropped, which the factory
/// does before propagating the error.
///
/// Instances are `Send` but take `&mut self`, so a single instance cannot
/// be driven from two threads at once; parallel callers use one instance
/// per thread, each bound to its own pool.
pub trait Codec {
    /// Setup, allocating any algorithm-specific state.
    ///
    /// The factory calls this before handing an instance out, so callers
    /// never need to. Calling it again is harmless: implementations replace
    /// their per-stream state, and every block transform starts from a
    /// fresh stream regardless.
    fn init(&mut self) -> CodecResult<()>;

    /// Transforms one input block into one output block.
    ///
    /// With `output_length == 0` the codec sizes the output itself and the
    /// returned handle's length is the exact number of bytes produced. A
    /// nonzero `output_length` asserts the exact required size, for callers
    /// that already know it from external metadata; producing any other
    /// number of bytes fails the call.
    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes>;
}

/// Type-erased wrapper for the compressor codecs.
///
/// Construction-time dispatch over the closed set of algorithms; created
/// through [`Compressor::create`] or [`Compressor::create_for_name`].
#[derive(Debug)]
pub enum Compressor {
    /// Deflate, gzip-framed or raw depending on the kind it was created for.
    Gzip(GzipCompressor),
    /// Bzip2.
    Bzip2(Bzip2Compressor),
    /// Raw snappy.
    Snappy(SnappyCompressor),
    /// Snappy with per-block length framing.
    SnappyBlock(SnappyBlockCompressor),
}

impl Compressor {
    /// Creates and initializes a compressor for `kind`.
    ///
    /// `CompressionKind::None` succeeds with `Ok(None)`: no instance is
    /// created and the caller passes blocks through untransformed. If
    /// initialization fails, the partially constructed instance is dropped
    /// here and the error propagates.
    pub fn create(
        pool: &Arc<MemPool>,
        reuse_buffer: bool,
        kind: CompressionKind,
    ) -> CodecResult<Option<Compressor>> {
        let mut compressor = match kind {
            CompressionKind::None => return Ok(None),
            CompressionKind::Gzip => {
                Compressor::Gzip(GzipCompressor::new(pool.clone(), reuse_buffer, true))
            }
            CompressionKind::Default => {
                Compressor::Gzip(GzipCompressor::new(pool.clone(), reuse_buffer, false))
            }
            CompressionKind::Bzip2 => {
                Compressor::Bzip2(Bzip2Compressor::new(pool.clone(), reuse_buffer))
            }
            CompressionKind::Snappy => {
                Compressor::Snappy(SnappyCompressor::new(pool.clone(), reuse_buffer))
            }
            CompressionKind::SnappyBlocked => {
                Compressor::SnappyBlock(SnappyBlockCompressor::new(pool.clone(), reuse_buffer))
            }
        };
        compressor.init()?;
        debug!(codec = kind.name(), "created compressor");
        Ok(Some(compressor))
    }

    /// Creates a compressor from raw identifier bytes.
    ///
    /// Resolves the bytes against the canonical table first; on a miss the
    /// failure is optionally recorded through `diagnostics` (gated on its
    /// spare capacity) and nothing is constructed.
    pub fn create_for_name(
        pool: &Arc<MemPool>,
        reuse_buffer: bool,
        name: &[u8],
        diagnostics: Option<&dyn DiagnosticSink>,
    ) -> CodecResult<Option<Compressor>> {
        let kind = resolve_name(name, diagnostics)?;
        Compressor::create(pool, reuse_buffer, kind)
    }
}

impl Codec for Compressor {
    fn init(&mut self) -> CodecResult<()> {
        match self {
            Compressor::Gzip(gzip) => gzip.init(),
            Compressor::Bzip2(bzip) => bzip.init(),
            Compressor::Snappy(snappy) => snappy.init(),
            Compressor::SnappyBlock(snappy) => snappy.init(),
        }
    }

    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes> {
        match self {
            Compressor::Gzip(gzip) => gzip.process_block(input, output_length),
            Compressor::Bzip2(bzip) => bzip.process_block(input, output_length),
            Compressor::Snappy(snappy) => snappy.process_block(input, output_length),
            Compressor::SnappyBlock(snappy) => snappy.process_block(input, output_length),
        }
    }
}

/// Type-erased wrapper for the decompressor codecs.
#[derive(Debug)]
pub enum Decompressor {
    /// Handles both gzip-framed and raw deflate streams; serves the Gzip
    /// and Default kinds alike.
    Gzip(GzipDecompressor),
    /// Bzip2.
    Bzip2(Bzip2Decompressor),
    /// Raw snappy.
    Snappy(SnappyDecompressor),
    /// Snappy with per-block length framing.
    SnappyBlock(SnappyBlockDecompressor),
}

impl Decompressor {
    /// Creates and initializes a decompressor for `kind`.
    ///
    /// Symmetric with [`Compressor::create`], except that the Default and
    /// Gzip kinds intentionally collapse to one decompressor that detects
    /// the framing per block, so decompression never pre-commits to a
    /// framing variant.
    pub fn create(
        pool: &Arc<MemPool>,
        reuse_buffer: bool,
        kind: CompressionKind,
    ) -> CodecResult<Option<Decompressor>> {
        let mut decompressor = match kind {
            CompressionKind::None => return Ok(None),
            CompressionKind::Default | CompressionKind::Gzip => {
                Decompressor::Gzip(GzipDecompressor::new(pool.clone(), reuse_buffer))
            }
            CompressionKind::Bzip2 => {
                Decompressor::Bzip2(Bzip2Decompressor::new(pool.clone(), reuse_buffer))
            }
            CompressionKind::Snappy => {
                Decompressor::Snappy(SnappyDecompressor::new(pool.clone(), reuse_buffer))
            }
            CompressionKind::SnappyBlocked => {
                Decompressor::SnappyBlock(SnappyBlockDecompressor::new(pool.clone(), reuse_buffer))
            }
        };
        decompressor.init()?;
        debug!(codec = kind.name(), "created decompressor");
        Ok(Some(decompressor))
    }

    /// Creates a decompressor from raw identifier bytes.
    pub fn create_for_name(
        pool: &Arc<MemPool>,
        reuse_buffer: bool,
        name: &[u8],
        diagnostics: Option<&dyn DiagnosticSink>,
    ) -> CodecResult<Option<Decompressor>> {
        let kind = resolve_name(name, diagnostics)?;
        Decompressor::create(pool, reuse_buffer, kind)
    }
}

impl Codec for Decompressor {
    fn init(&mut self) -> CodecResult<()> {
        match self {
            Decompressor::Gzip(gzip) => gzip.init(),
            Decompressor::Bzip2(bzip) => bzip.init(),
            Decompressor::Snappy(snappy) => snappy.init(),
            Decompressor::SnappyBlock(snappy) => snappy.init(),
        }
    }

    fn process_block(&mut self, input: &[u8], output_length: usize) -> CodecResult<Bytes> {
        match self {
            Decompressor::Gzip(gzip) => gzip.process_block(input, output_length),
            Decompressor::Bzip2(bzip) => bzip.process_block(input, output_length),
            Decompressor::Snappy(snappy) => snappy.process_block(input, output_length),
            Decompressor::SnappyBlock(snappy) => snappy.process_block(input, output_length),
        }
    }
}

fn resolve_name(
    name: &[u8],
    diagnostics: Option<&dyn DiagnosticSink>,
) -> CodecResult<CompressionKind> {
    CompressionKind::from_name(name).map_err(|err| {
        warn!(name = %String::from_utf8_lossy(name), "codec name resolution failed");
        if let Some(sink) = diagnostics {
            if sink.has_capacity() {
                sink.record(&err.to_string());
            }
        }
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    fn pool() -> Arc<MemPool> {
        Arc::new(MemPool::new())
    }

    #[test]
    fn none_kind_yields_no_instance() {
        assert!(Compressor::create(&pool(), true, CompressionKind::None)
            .unwrap()
            .is_none());
        assert!(Decompressor::create(&pool(), true, CompressionKind::None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn every_non_none_kind_constructs_both_directions() {
        for kind in CompressionKind::ALL {
            if kind == CompressionKind::None {
                continue;
            }
            assert!(Compressor::create(&pool(), false, kind).unwrap().is_some());
            assert!(Decompressor::create(&pool(), false, kind)
                .unwrap()
                .is_some());
        }
    }

    #[test]
    fn default_and_gzip_share_a_decompressor() {
        let for_default = Decompressor::create(&pool(), false, CompressionKind::Default)
            .unwrap()
            .unwrap();
        let for_gzip = Decompressor::create(&pool(), false, CompressionKind::Gzip)
            .unwrap()
            .unwrap();
        assert!(matches!(for_default, Decompressor::Gzip(_)));
        assert!(matches!(for_gzip, Decompressor::Gzip(_)));
    }

    #[test]
    fn instances_and_errors_are_debug_formattable() {
        let comp = Compressor::create(&pool(), false, CompressionKind::Gzip)
            .unwrap()
            .unwrap();
        assert!(format!("{comp:?}").contains("Gzip"));
        let err = CompressionKind::from_name(b"bogus").unwrap_err();
        assert!(format!("{err:?}").contains("UnknownCodec"));
    }

    #[test]
    fn reinit_mid_use_keeps_codec_usable() {
        let input = b"blocks before and after a second init".to_vec();
        let mut comp = Compressor::create(&pool(), false, CompressionKind::Gzip)
            .unwrap()
            .unwrap();
        let first = comp.process_block(&input, 0).unwrap();
        comp.init().unwrap();
        let second = comp.process_block(&input, 0).unwrap();

        let mut decomp = Decompressor::create(&pool(), false, CompressionKind::Gzip)
            .unwrap()
            .unwrap();
        assert_eq!(&decomp.process_block(&first, 0).unwrap()[..], &input[..]);
        assert_eq!(&decomp.process_block(&second, 0).unwrap()[..], &input[..]);
    }

    #[test]
    fn unknown_name_constructs_nothing() {
        let err = Compressor::create_for_name(&pool(), true, b"not-a-codec", None).unwrap_err();
        assert!(matches!(err, CodecError::UnknownCodec(_)));
    }
}
