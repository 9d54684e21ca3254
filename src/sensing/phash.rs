use anyhow::Result;
use image::ImageFormat;
use image_hasher::{HashAlg, HasherConfig};

use super::capture::CapturedImage;

/// Returned by [`compute_hamming_distance`] when two fingerprints can't be compared.
pub const MAX_DISTANCE: u32 = u32::MAX;

/// Shortest encoded screenshot worth fingerprinting.
pub const MIN_ENCODED_LEN: usize = 1000;

/// Shortest common prefix (in hex digits) that still carries enough signal.
const MIN_COMPARABLE_DIGITS: usize = 4;

const FALLBACK_SAMPLE_LEN: usize = 500;
const FALLBACK_STRIDE: usize = 10;

/// Perceptual fingerprint of a screenshot as lowercase hex.
pub fn fingerprint(image: &CapturedImage) -> Option<String> {
    if image.encoded().len() < MIN_ENCODED_LEN {
        return None;
    }

    match compute_phash(image.bytes()) {
        Ok(hash) => Some(hash),
        Err(err) => {
            log::warn!("perceptual hash failed, using byte checksum instead: {err}");
            Some(fallback_fingerprint(image.encoded()))
        }
    }
}

pub fn compute_phash(png_bytes: &[u8]) -> Result<String> {
    let img = image::load_from_memory_with_format(png_bytes, ImageFormat::Png)?;
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::DoubleGradient)
        .hash_size(8, 8)
        .to_hasher();

    let hash = hasher.hash_image(&img);
    Ok(to_hex(hash.as_bytes()))
}

/// Rolling checksum over a strided sample of the encoded payload.
pub fn fallback_fingerprint(encoded: &str) -> String {
    let checksum = encoded
        .bytes()
        .take(FALLBACK_SAMPLE_LEN)
        .step_by(FALLBACK_STRIDE)
        .fold(0u32, |acc, byte| {
            acc.wrapping_shl(5)
                .wrapping_sub(acc)
                .wrapping_add(u32::from(byte))
        });
    format!("{checksum:08x}")
}

/// Bit-level Hamming distance between two hex fingerprints.
///
/// Hashes of different lengths are compared on their common prefix and the
/// number of dropped digits is added on top. Non-hex digits count as zero bits.
pub fn compute_hamming_distance(lhs: &str, rhs: &str) -> u32 {
    if lhs.is_empty() || rhs.is_empty() {
        return MAX_DISTANCE;
    }

    let lhs_len = lhs.chars().count();
    let rhs_len = rhs.chars().count();
    let common = lhs_len.min(rhs_len);
    let penalty = lhs_len.abs_diff(rhs_len);

    if penalty > 0 && common < MIN_COMPARABLE_DIGITS {
        return MAX_DISTANCE;
    }

    let differing_bits: u32 = lhs
        .chars()
        .zip(rhs.chars())
        .map(|(a, b)| (hex_nibble(a) ^ hex_nibble(b)).count_ones())
        .sum();

    u32::try_from(penalty)
        .ok()
        .and_then(|penalty| differing_bits.checked_add(penalty))
        .unwrap_or(MAX_DISTANCE)
}

fn hex_nibble(digit: char) -> u8 {
    digit.to_digit(16).map(|d| d as u8).unwrap_or(0)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_hashes_have_zero_distance() {
        for hash in ["0000", "ffff", "8f3a9c0012de77b1", "a"] {
            assert_eq!(compute_hamming_distance(hash, hash), 0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            ("8f3a9c0012de77b1", "8f3a9c0012de7700"),
            ("ffff", "0000"),
            ("12345678", "1234"),
        ];
        for (a, b) in pairs {
            assert_eq!(compute_hamming_distance(a, b), compute_hamming_distance(b, a));
        }
    }

    #[test]
    fn counts_differing_bits() {
        assert_eq!(compute_hamming_distance("0000", "000f"), 4);
        assert_eq!(compute_hamming_distance("ffff", "0000"), 16);
        assert_eq!(compute_hamming_distance("1000", "3000"), 1);
    }

    #[test]
    fn empty_input_is_maximally_distant() {
        assert_eq!(compute_hamming_distance("", "abcd"), MAX_DISTANCE);
        assert_eq!(compute_hamming_distance("abcd", ""), MAX_DISTANCE);
    }

    #[test]
    fn length_mismatch_adds_penalty() {
        // Same prefix, four extra digits on one side.
        assert_eq!(compute_hamming_distance("abcd1234", "abcd"), 4);
        // One differing bit in the prefix plus two dropped digits.
        assert_eq!(compute_hamming_distance("abce00", "abcf"), 3);
    }

    #[test]
    fn too_short_after_truncation_is_maximally_distant() {
        assert_eq!(compute_hamming_distance("abc", "abcdef"), MAX_DISTANCE);
    }

    #[test]
    fn invalid_digits_decode_to_zero_bits() {
        assert_eq!(compute_hamming_distance("zz00", "0000"), 0);
        assert_eq!(compute_hamming_distance("zz01", "0000"), 1);
    }

    #[test]
    fn fallback_fingerprint_is_deterministic_hex() {
        let payload = "iVBORw0KGgo".repeat(200);
        let first = fallback_fingerprint(&payload);
        assert_eq!(first, fallback_fingerprint(&payload));
        assert_eq!(first.len(), 8);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, fallback_fingerprint(&"QUJD".repeat(400)));
    }

    #[test]
    fn short_payloads_are_not_fingerprinted() {
        let image = CapturedImage::from_base64("aGVsbG8=").unwrap();
        assert_eq!(fingerprint(&image), None);
    }

    #[test]
    fn undecodable_image_uses_fallback() {
        // Valid base64 that isn't a PNG.
        let encoded = "QUJD".repeat(400);
        let image = CapturedImage::from_base64(&encoded).unwrap();
        assert_eq!(fingerprint(&image), Some(fallback_fingerprint(&encoded)));
    }
}
