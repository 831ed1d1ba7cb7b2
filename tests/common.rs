use std::sync::Arc;

use blockcodec::{CompressionKind, Compressor, Decompressor, MemPool};
use rand::rngs::StdRng;
use rand::{RngCore as _, SeedableRng as _};

pub fn block_sizes() -> Vec<usize> {
    vec![0, 1, 4096, 1_000_000]
}

pub fn non_none_kinds() -> Vec<CompressionKind> {
    CompressionKind::ALL
        .into_iter()
        .filter(|kind| *kind != CompressionKind::None)
        .collect()
}

pub fn random_block(len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(14);
    let mut block = vec![0u8; len];
    rng.fill_bytes(&mut block);
    block
}

pub fn zero_block(len: usize) -> Vec<u8> {
    vec![0u8; len]
}

pub fn compressor(kind: CompressionKind, reuse_buffer: bool) -> Compressor {
    let pool = Arc::new(MemPool::new());
    Compressor::create(&pool, reuse_buffer, kind)
        .expect("compressor creation failed")
        .expect("non-NONE kind must yield an instance")
}

pub fn decompressor(kind: CompressionKind, reuse_buffer: bool) -> Decompressor {
    let pool = Arc::new(MemPool::new());
    Decompressor::create(&pool, reuse_buffer, kind)
        .expect("decompressor creation failed")
        .expect("non-NONE kind must yield an instance")
}
