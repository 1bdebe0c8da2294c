// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deflate compression for stored build logs.
//!
//! Logs at or above [`COMPRESS_LOG_MIN_SIZE`] are stored zlib-compressed;
//! shorter logs are stored raw. The stored `outputLen` column always holds
//! the uncompressed length, which is also how the read path decides whether
//! a blob needs decompression.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Minimum raw log size, in bytes, for compression to be attempted.
pub const COMPRESS_LOG_MIN_SIZE: usize = 1024;

/// Compress a log if it is large enough.
///
/// Returns the blob to store and the uncompressed length. Compression
/// failure falls back to storing the raw bytes.
pub fn maybe_compress(raw: &[u8]) -> (Vec<u8>, usize) {
    if raw.len() >= COMPRESS_LOG_MIN_SIZE {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        let compressed = encoder.write_all(raw).and_then(|_| encoder.finish());
        match compressed {
            Ok(blob) => return (blob, raw.len()),
            Err(e) => tracing::warn!(error = %e, "log compression failed, storing raw"),
        }
    }
    (raw.to_vec(), raw.len())
}

/// Recover the raw log from a stored blob.
///
/// `output_len` is the stored uncompressed length; values at or above the
/// compression threshold mean the blob is compressed. Returns `None` when
/// decompression fails (the caller omits the log and logs the error).
pub fn maybe_decompress(blob: Vec<u8>, output_len: usize) -> Option<Vec<u8>> {
    if output_len < COMPRESS_LOG_MIN_SIZE {
        return Some(blob);
    }
    let mut raw = Vec::with_capacity(output_len);
    match ZlibDecoder::new(blob.as_slice()).read_to_end(&mut raw) {
        Ok(_) => Some(raw),
        Err(e) => {
            tracing::error!(error = %e, "failed to decompress stored log");
            None
        }
    }
}

#[cfg(test)]
#[path = "compress_tests.rs"]
mod tests;
