//! The position codec.
//!
//! A virtualized method's stub carries its entry point as a short string. The string is
//! the Ascii85 form of the little-endian offset XORed with a keystream derived from the
//! module key, so the same offset encodes differently in every protected binary.
//!
//! Alphabet: `'!'` (0x21) to `'u'` (0x75), plus `'z'` for an all-zero group at a group
//! boundary. The keystream takes the top byte of each of eight splitmix64 outputs seeded
//! with the key.
//!
//! # Examples
//!
//! ```rust
//! use vmscope::devirtualization::{decode_position, encode_position, FormatError};
//!
//! let key = 0x1234_ABCD;
//! let encoded = encode_position(0x7F3A, key);
//! assert_eq!(encoded, "p7rPIP=p`A");
//! assert_eq!(decode_position(&encoded, key)?, 0x7F3A);
//!
//! assert_eq!(
//!     decode_position("p7r~IP=p`A", key),
//!     Err(FormatError::InvalidCharacter { character: '~', index: 3 })
//! );
//! # Ok::<(), FormatError>(())
//! ```

use thiserror::Error;

/// Why a position string could not be decoded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// A character outside the alphabet.
    #[error("invalid character '{character}' at index {index}")]
    InvalidCharacter {
        /// The offending character
        character: char,
        /// Its position in the string, in characters
        index: usize,
    },

    /// A `z` inside a group.
    #[error("'z' inside a group at index {index}")]
    MisplacedZeroGroup {
        /// Position of the `z`
        index: usize,
    },

    /// An all-zero group written out instead of as `z`.
    #[error("zero group at index {index} must be written as 'z'")]
    SpelledZeroGroup {
        /// Position of the group's first character
        index: usize,
    },

    /// A group whose value exceeds 32 bits.
    #[error("group ending at index {index} exceeds 32 bits")]
    Overflow {
        /// Position of the group's last character
        index: usize,
    },

    /// A final group of fewer than five characters.
    #[error("truncated group at index {index}")]
    Truncated {
        /// Position of the group's first character
        index: usize,
    },

    /// The payload is not eight bytes long.
    #[error("payload of {found} bytes, expected 8")]
    Length {
        /// Number of decoded bytes
        found: usize,
    },
}

const FIRST: u8 = b'!';
const LAST: u8 = b'u';
const ZERO_GROUP: char = 'z';
const PAYLOAD_LEN: usize = 8;

fn keystream(key: i64) -> [u8; PAYLOAD_LEN] {
    let mut state = key as u64;
    let mut stream = [0_u8; PAYLOAD_LEN];

    for byte in &mut stream {
        state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        *byte = (z >> 56) as u8;
    }

    stream
}

fn apply_keystream(payload: &mut [u8; PAYLOAD_LEN], key: i64) {
    for (byte, mask) in payload.iter_mut().zip(keystream(key)) {
        *byte ^= mask;
    }
}

/// Encode `position` under `key`.
#[must_use]
pub fn encode_position(position: i64, key: i64) -> String {
    let mut payload = position.to_le_bytes();
    apply_keystream(&mut payload, key);

    let mut encoded = String::with_capacity(10);
    for chunk in payload.chunks_exact(4) {
        let mut value = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if value == 0 {
            encoded.push(ZERO_GROUP);
            continue;
        }

        let mut digits = [0_u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = (value % 85) as u8 + FIRST;
            value /= 85;
        }
        encoded.extend(digits.iter().map(|&digit| char::from(digit)));
    }

    encoded
}

fn group_value(digits: &[u8], index: usize) -> Result<u32, FormatError> {
    let value = digits
        .iter()
        .fold(0_u64, |value, &digit| value * 85 + u64::from(digit));

    u32::try_from(value).map_err(|_| FormatError::Overflow { index })
}

/// Decode a position string under `key`.
///
/// Only the spelling [`encode_position`] produces is accepted, so every offset has exactly
/// one valid string. The empty string decodes to offset 0.
///
/// # Errors
/// Returns [`FormatError::InvalidCharacter`] for the first character outside the alphabet,
/// wherever it occurs. Otherwise returns a [`FormatError`] for the first malformed group.
pub fn decode_position(encoded: &str, key: i64) -> Result<i64, FormatError> {
    if encoded.is_empty() {
        return Ok(0);
    }

    let digits = encoded
        .chars()
        .enumerate()
        .map(|(index, character)| match character {
            ZERO_GROUP => Ok(None),
            _ => u8::try_from(character)
                .ok()
                .filter(|byte| (FIRST..=LAST).contains(byte))
                .map(|byte| Some(byte - FIRST))
                .ok_or(FormatError::InvalidCharacter { character, index }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut bytes = Vec::with_capacity(PAYLOAD_LEN);
    let mut group = Vec::with_capacity(5);

    for (index, digit) in digits.into_iter().enumerate() {
        let Some(digit) = digit else {
            if !group.is_empty() {
                return Err(FormatError::MisplacedZeroGroup { index });
            }
            bytes.extend_from_slice(&[0; 4]);
            continue;
        };

        group.push(digit);
        if group.len() == 5 {
            let value = group_value(&group, index)?;
            if value == 0 {
                return Err(FormatError::SpelledZeroGroup { index: index - 4 });
            }
            bytes.extend_from_slice(&value.to_be_bytes());
            group.clear();
        }
    }

    if !group.is_empty() {
        return Err(FormatError::Truncated {
            index: encoded.chars().count() - group.len(),
        });
    }

    let Ok(mut payload) = <[u8; PAYLOAD_LEN]>::try_from(bytes.as_slice()) else {
        return Err(FormatError::Length { found: bytes.len() });
    };

    apply_keystream(&mut payload, key);
    Ok(i64::from_le_bytes(payload))
}
