//! Stateless per-chunk compression.
//!
//! Each chunk payload becomes one self-contained zlib stream, so any record
//! can be inflated without context from its neighbours. Errors are returned
//! raw; callers attach the path / sequence-id context.

use std::io::{self, Write};

use flate2::write::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;

use crate::chunk::CHUNK_SIZE;

/// Compress one chunk payload into a standalone zlib stream. An empty
/// payload still yields a valid (empty-decoding) stream, so zero-byte files
/// round-trip like any other.
pub fn deflate_chunk(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(payload.len() / 2 + 64),
        Compression::default(),
    );
    encoder.write_all(payload)?;
    encoder.finish()
}

/// Inflate one record payload back to the original chunk bytes.
pub fn inflate_chunk(compressed: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(Vec::with_capacity(CHUNK_SIZE));
    decoder.write_all(compressed)?;
    decoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_inflate_roundtrip() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let packed = deflate_chunk(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(inflate_chunk(&packed).unwrap(), data);
    }

    #[test]
    fn empty_payload_roundtrip() {
        let packed = deflate_chunk(&[]).unwrap();
        assert!(!packed.is_empty());
        assert!(inflate_chunk(&packed).unwrap().is_empty());
    }

    #[test]
    fn corrupt_stream_is_an_error() {
        let mut packed = deflate_chunk(b"hello chunk").unwrap();
        let mid = packed.len() / 2;
        packed[mid] ^= 0xFF;
        assert!(inflate_chunk(&packed).is_err());
    }
}
