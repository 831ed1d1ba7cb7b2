use crate::error::{CodecError, CodecResult};

/// Hadoop codec name for raw-deflate compression.
pub const DEFAULT_COMPRESSION: &str = "org.apache.hadoop.io.compress.DefaultCodec";
/// Hadoop codec name for gzip-framed deflate compression.
pub const GZIP_COMPRESSION: &str = "org.apache.hadoop.io.compress.GzipCodec";
/// Hadoop codec name for bzip2 compression.
pub const BZIP2_COMPRESSION: &str = "org.apache.hadoop.io.compress.BZip2Codec";
/// Hadoop codec name for raw snappy compression.
pub const SNAPPY_COMPRESSION: &str = "org.apache.hadoop.io.compress.SnappyCodec";
/// Codec name for snappy with per-block length framing.
pub const SNAPPY_BLOCK_COMPRESSION: &str = "org.apache.hadoop.io.compress.SnappyBlockCodec";

/// The canonical identity of a compression algorithm/framing combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionKind {
    /// No compression; the factory yields no codec instance for this kind.
    None,
    /// Raw deflate stream. Same algorithm as [`CompressionKind::Gzip`],
    /// differing only in the absence of the gzip container framing.
    Default,
    /// Deflate wrapped in the standard gzip header and trailer.
    Gzip,
    /// Bzip2.
    Bzip2,
    /// Raw snappy, no internal block framing.
    Snappy,
    /// Snappy with per-block length framing so sub-blocks can be
    /// decompressed independently.
    SnappyBlocked,
}

/// The single canonical name table, used in both lookup directions.
///
/// Immutable and process-wide; concurrent reads need no synchronization.
const CODEC_TABLE: [(&str, CompressionKind); 6] = [
    ("", CompressionKind::None),
    (DEFAULT_COMPRESSION, CompressionKind::Default),
    (GZIP_COMPRESSION, CompressionKind::Gzip),
    (BZIP2_COMPRESSION, CompressionKind::Bzip2),
    (SNAPPY_COMPRESSION, CompressionKind::Snappy),
    (SNAPPY_BLOCK_COMPRESSION, CompressionKind::SnappyBlocked),
];

impl CompressionKind {
    /// Every kind, in table order. Handy for exhaustive tests.
    pub const ALL: [CompressionKind; 6] = [
        CompressionKind::None,
        CompressionKind::Default,
        CompressionKind::Gzip,
        CompressionKind::Bzip2,
        CompressionKind::Snappy,
        CompressionKind::SnappyBlocked,
    ];

    /// Returns the canonical name of this kind.
    ///
    /// Total over the enumeration: a miss means the table is out of sync
    /// with the enum, which is a programming invariant violation and panics.
    #[must_use]
    pub fn name(self) -> &'static str {
        CODEC_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
            .unwrap_or_else(|| unreachable!("codec table out of sync with CompressionKind"))
    }

    /// Resolves arbitrary identifier bytes against the canonical table.
    ///
    /// The bytes are compared exactly and case-sensitively; they are not
    /// assumed to be UTF-8 or NUL-terminated. A miss fails with
    /// [`CodecError::UnknownCodec`] carrying the offending bytes.
    pub fn from_name(name: &[u8]) -> CodecResult<CompressionKind> {
        CODEC_TABLE
            .iter()
            .find(|(canonical, _)| canonical.as_bytes() == name)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| CodecError::UnknownCodec(name.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_lookup_round_trips_every_kind() {
        for kind in CompressionKind::ALL {
            let name = kind.name();
            assert_eq!(CompressionKind::from_name(name.as_bytes()).unwrap(), kind);
        }
    }

    #[test]
    fn empty_name_is_none() {
        assert_eq!(
            CompressionKind::from_name(b"").unwrap(),
            CompressionKind::None
        );
    }

    #[test]
    fn gzip_name_resolves_to_gzip() {
        assert_eq!(
            CompressionKind::from_name(GZIP_COMPRESSION.as_bytes()).unwrap(),
            CompressionKind::Gzip
        );
    }

    #[test]
    fn unknown_name_carries_offending_bytes() {
        let err = CompressionKind::from_name(b"garbage-codec").unwrap_err();
        match err {
            CodecError::UnknownCodec(name) => assert_eq!(name, b"garbage-codec"),
            other => panic!("expected UnknownCodec, got {other:?}"),
        }
    }

    #[test]
    fn names_are_unique() {
        for (i, (name, _)) in CODEC_TABLE.iter().enumerate() {
            for (other, _) in &CODEC_TABLE[i + 1..] {
                assert_ne!(name, other);
            }
        }
    }
}
