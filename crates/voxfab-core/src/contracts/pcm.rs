//! PCM16 framing invariants.
//!
//! All audio on the fabric is raw PCM16 little-endian mono at 16 kHz. Every
//! byte span emitted or accepted must have even length — downstream 16-bit
//! sample viewers fail on odd spans. Padding is applied at **both** ingress
//! and egress (producer and consumer), so no single side has to trust the
//! other to be well-behaved.

/// Sample rate of all fabric audio.
pub const SAMPLE_RATE: u32 = 16_000;

/// Recommended upper bound on samples per binary frame.
pub const RECOMMENDED_MAX_SAMPLES: usize = 8_192;

/// Bytes per PCM16 sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// True when a byte span satisfies the even-length invariant.
#[must_use]
pub const fn is_aligned(len: usize) -> bool {
    len % BYTES_PER_SAMPLE == 0
}

/// Pad an odd-length span with a trailing zero byte.
///
/// Even-length input is returned unchanged (no copy).
#[must_use]
pub fn pad_even(mut bytes: Vec<u8>) -> Vec<u8> {
    if !is_aligned(bytes.len()) {
        bytes.push(0);
    }
    bytes
}

/// Number of whole samples in a (possibly unpadded) span.
#[must_use]
pub const fn sample_count(bytes: &[u8]) -> usize {
    bytes.len() / BYTES_PER_SAMPLE
}
