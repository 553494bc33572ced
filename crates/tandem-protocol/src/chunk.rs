//! Splitting payloads into transport-sized chunks.
//!
//! Chunks carry no sequence metadata. Both ends derive the same chunk
//! boundaries from the announced length alone, so the receiver knows
//! exactly how many datagrams to expect and how large each one is.

use std::ops::Range;

/// Number of chunks needed for `len` bytes, i.e. `ceil(len / chunk)`.
///
/// `chunk` must be non-zero.
pub fn chunk_count(len: usize, chunk: usize) -> usize {
    len.div_ceil(chunk)
}

/// Byte ranges of each chunk, in order. Every chunk is `chunk` bytes
/// except possibly the last, which carries the remainder.
pub fn chunk_ranges(len: usize, chunk: usize) -> impl Iterator<Item = Range<usize>> {
    (0..chunk_count(len, chunk)).map(move |i| {
        let start = i * chunk;
        start..(start + chunk).min(len)
    })
}
