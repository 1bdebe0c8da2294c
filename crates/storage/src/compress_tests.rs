// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn short_logs_are_stored_raw() {
    let raw = b"world\n".to_vec();
    let (blob, len) = maybe_compress(&raw);
    assert_eq!(blob, raw);
    assert_eq!(len, 6);
    assert_eq!(maybe_decompress(blob, len), Some(raw));
}

#[test]
fn long_logs_are_stored_compressed() {
    let raw = vec![b'A'; 4096];
    let (blob, len) = maybe_compress(&raw);
    assert_eq!(len, 4096);
    assert_ne!(blob, raw);
    assert!(blob.len() < raw.len());
    assert_eq!(maybe_decompress(blob, len), Some(raw));
}

#[test]
fn threshold_boundary() {
    let below = vec![b'x'; COMPRESS_LOG_MIN_SIZE - 1];
    let (blob, _) = maybe_compress(&below);
    assert_eq!(blob, below);

    let at = vec![b'x'; COMPRESS_LOG_MIN_SIZE];
    let (blob, len) = maybe_compress(&at);
    assert_ne!(blob, at);
    assert_eq!(maybe_decompress(blob, len), Some(at));
}

#[test]
fn corrupt_blob_yields_none() {
    let garbage = vec![0xde, 0xad, 0xbe, 0xef];
    assert_eq!(maybe_decompress(garbage, COMPRESS_LOG_MIN_SIZE), None);
}

proptest! {
    #[test]
    fn roundtrip_any_log(raw in proptest::collection::vec(any::<u8>(), 0..8192)) {
        let (blob, len) = maybe_compress(&raw);
        prop_assert_eq!(len, raw.len());
        prop_assert_eq!(maybe_decompress(blob, len), Some(raw));
    }
}
