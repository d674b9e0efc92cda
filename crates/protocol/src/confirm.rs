//! Confirmation codes shown to the user before the token signs.
//!
//! The code is three digits in `1..=5`, sampled from the SHA-256 digest of
//! the raw challenge at the first, middle and last byte. The token computes
//! the same code from the bytes it received, so a user who enters the code
//! on the device confirms that both sides saw the same challenge.
//!
//! The code is a sample, not a hash: two different blobs can share a code.

use std::fmt;

use sha2::{Digest, Sha256};

/// Number of digits in a confirmation code.
pub const CODE_LENGTH: usize = 3;

/// Digest offsets sampled for each digit.
pub const SAMPLE_OFFSETS: [usize; CODE_LENGTH] = [0, 15, 31];

/// A three-digit confirmation code. Every digit is in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfirmationCode([u8; CODE_LENGTH]);

impl ConfirmationCode {
    /// The digits in display order.
    pub fn digits(&self) -> [u8; CODE_LENGTH] {
        self.0
    }
}

impl fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{} {} {}", a, b, c)
    }
}

/// Map one digest byte onto a button number in `1..=5`.
///
/// Values below 6 map to 1; everything else to `value % 5 + 1`.
pub fn digit_for_byte(value: u8) -> u8 {
    if value < 6 {
        1
    } else {
        value % 5 + 1
    }
}

/// Derive the confirmation code for a raw challenge blob.
pub fn derive_code(raw: &[u8]) -> ConfirmationCode {
    let digest = Sha256::digest(raw);
    debug_assert_eq!(digest.len(), 32);
    ConfirmationCode(SAMPLE_OFFSETS.map(|offset| digit_for_byte(digest[offset])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_for_every_byte_in_range() {
        for value in 0..=u8::MAX {
            let digit = digit_for_byte(value);
            assert!((1..=5).contains(&digit), "byte {} gave {}", value, digit);
        }
    }

    #[test]
    fn test_digit_mapping_edges() {
        assert_eq!(digit_for_byte(0), 1);
        assert_eq!(digit_for_byte(5), 1);
        assert_eq!(digit_for_byte(6), 2);
        assert_eq!(digit_for_byte(9), 5);
        assert_eq!(digit_for_byte(10), 1);
        assert_eq!(digit_for_byte(255), 1);
    }

    #[test]
    fn test_derive_code_known_values() {
        // sha256("") = e3b0c442...b855; bytes 0, 15, 31 are 0xe3, 0x24, 0x55
        assert_eq!(derive_code(b"").digits(), [3, 2, 1]);
    }

    #[test]
    fn test_derive_code_deterministic() {
        let blob = b"some challenge bytes";
        assert_eq!(derive_code(blob), derive_code(blob));
    }

    #[test]
    fn test_display() {
        assert_eq!(derive_code(b"").to_string(), "3 2 1");
    }
}
