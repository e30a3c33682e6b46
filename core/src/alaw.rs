//! ITU-T G.711 A-law codec.
//!
//! Encodes signed 16-bit PCM samples to A-law octets (65-byte chord, XOR 0x55
//! bit inversion on even bits). The hot path is a precomputed 65536-entry
//! lookup table rather than the per-sample branchy reference algorithm.

use crate::protocol_constants::ALAW_SILENCE;

/// Encodes a single PCM16 sample to its A-law octet via table lookup.
///
/// Negative samples are reinterpreted as their two's-complement unsigned
/// 16-bit value (`sample as u16`) to index the table.
#[must_use]
#[inline]
pub fn encode_sample(sample: i16) -> u8 {
    ALAW_TABLE[sample as u16 as usize]
}

/// Encodes a chunk of PCM16 samples to A-law bytes using the lookup table.
#[must_use]
pub fn encode_chunk(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| encode_sample(s)).collect()
}

/// Computes the A-law encoding of a sample from first principles.
///
/// Used only to build [`ALAW_TABLE`] at startup; the runtime hot path always
/// goes through the table.
fn compute_alaw(sample: i16) -> u8 {
    // A-law's sign bit is 1 for non-negative samples, 0 for negative ones
    // (the inverse of what it looks like at a glance) -- confirmed against
    // the worked full-scale examples rather than a literal prose reading.
    let sign: u8 = if sample < 0 { 0x00 } else { 0x80 };
    let magnitude: i32 = (sample as i32).unsigned_abs() as i32;
    let magnitude = magnitude.min(32767);

    let (exponent, mantissa): (u8, u8) = if magnitude >= 256 {
        let mut exponent = 7u8;
        for bit in (8..=14).rev() {
            if magnitude & (1 << bit) != 0 {
                exponent = (bit - 7) as u8;
                break;
            }
        }
        let mantissa = ((magnitude >> (exponent + 3)) & 0x0F) as u8;
        (exponent, mantissa)
    } else {
        (0, (magnitude >> 4) as u8)
    };

    (sign | (exponent << 4) | mantissa) ^ 0x55
}

/// A 65536-entry table mapping every possible 16-bit sample (indexed as
/// `sample as u16`) to its A-law octet.
///
/// Built once at first use via [`std::sync::LazyLock`].
pub static ALAW_TABLE: std::sync::LazyLock<[u8; 65536]> = std::sync::LazyLock::new(|| {
    let mut table = [0u8; 65536];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = compute_alaw(i as u16 as i16);
    }
    table
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sample_encodes_to_silence_constant() {
        assert_eq!(encode_sample(0), ALAW_SILENCE);
        assert_eq!(encode_sample(0), 0xD5);
    }

    #[test]
    fn positive_full_scale_matches_spec() {
        assert_eq!(encode_sample(32767), 0xAA);
    }

    #[test]
    fn negative_full_scale_matches_spec() {
        assert_eq!(encode_sample(-32768), 0x2A);
    }

    #[test]
    fn encode_chunk_preserves_length_and_matches_per_sample() {
        let samples = [0i16, 100, -100, 32767, -32768, 5000, -5000];
        let chunk = encode_chunk(&samples);
        assert_eq!(chunk.len(), samples.len());
        for (s, b) in samples.iter().zip(chunk.iter()) {
            assert_eq!(*b, encode_sample(*s));
        }
    }

    #[test]
    fn table_matches_direct_computation_for_sampled_range() {
        // Full 65536-entry exhaustive check is cheap; verify against the
        // reference computation directly rather than trusting the table.
        for raw in (i16::MIN..=i16::MAX).step_by(997) {
            assert_eq!(encode_sample(raw), compute_alaw(raw));
        }
    }

    #[test]
    fn sign_bit_clear_for_negative_samples_before_xor() {
        // -1's magnitude is 1 (< 256), exponent 0, mantissa 0 -> 0x00 ^ 0x55.
        let encoded = encode_sample(-1);
        assert_eq!(encoded, 0x55);
    }

    #[test]
    fn sign_bit_set_for_positive_samples_before_xor() {
        // 1's magnitude is 1 (< 256), exponent 0, mantissa 0 -> 0x80 ^ 0x55.
        let encoded = encode_sample(1);
        assert_eq!(encoded, 0x80 ^ 0x55);
    }
}
