//! Pluggable block compression codecs with Hadoop-compatible identifiers.
//!
//! A codec is bound to one algorithm, one direction (compress or decompress),
//! one [`MemPool`] allocator, and one buffer-reuse policy. Codecs are created
//! through the factory methods on [`Compressor`] and [`Decompressor`], either
//! from a [`CompressionKind`] or from the raw bytes of a canonical codec name
//! such as `org.apache.hadoop.io.compress.GzipCodec`.
//!
//! ```
//! use blockcodec::{Codec, CompressionKind, Compressor, Decompressor, MemPool};
//! use std::sync::Arc;
//!
//! let pool = Arc::new(MemPool::new());
//! let mut compressor = Compressor::create(&pool, true, CompressionKind::Snappy)
//!     .unwrap()
//!     .expect("snappy always yields an instance");
//! let block = compressor.process_block(b"some bytes", 0).unwrap();
//!
//! let mut decompressor = Decompressor::create(&pool, true, CompressionKind::Snappy)
//!     .unwrap()
//!     .unwrap();
//! let restored = decompressor.process_block(&block, 0).unwrap();
//! assert_eq!(&restored[..], b"some bytes");
//! ```

mod buffer;
mod codec;
mod compress;
mod decompress;
mod diagnostics;
mod error;
mod kind;
mod pool;

pub use codec::{Codec, Compressor, Decompressor};
pub use compress::{Bzip2Compressor, GzipCompressor, SnappyBlockCompressor, SnappyCompressor};
pub use decompress::{
    Bzip2Decompressor, GzipDecompressor, SnappyBlockDecompressor, SnappyDecompressor,
};
pub use diagnostics::{DiagnosticLog, DiagnosticSink};
pub use error::{CodecError, CodecResult};
pub use kind::{
    CompressionKind, BZIP2_COMPRESSION, DEFAULT_COMPRESSION, GZIP_COMPRESSION,
    SNAPPY_BLOCK_COMPRESSION, SNAPPY_COMPRESSION,
};
pub use pool::MemPool;
