//! Character encoding of numeric fields.
//!
//! Every character carries 6 bits of the value offset by `0x30`, most
//! significant character first. Two characters hold 12 bits, three hold 18
//! and four hold 24.

use crate::base::{Error, Result};
use std::fmt;

const CHAR_OFFSET: u8 = 0x30;
const GROUP_BITS: u32 = 6;
const GROUP_MASK: u32 = 0x3F;

/// Number of characters in an encoded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldWidth {
    Two,
    Three,
    Four,
}

impl FieldWidth {
    /// Number of characters.
    #[inline]
    pub fn chars(self) -> usize {
        match self {
            FieldWidth::Two => 2,
            FieldWidth::Three => 3,
            FieldWidth::Four => 4,
        }
    }

    /// Largest value the width can carry, `2^(6 * chars) - 1`.
    #[inline]
    pub fn max_value(self) -> u32 {
        (1u32 << (GROUP_BITS * self.chars() as u32)) - 1
    }

    pub fn from_chars(chars: usize) -> Option<FieldWidth> {
        match chars {
            2 => Some(FieldWidth::Two),
            3 => Some(FieldWidth::Three),
            4 => Some(FieldWidth::Four),
            _ => None,
        }
    }
}

/// A value encoded as 2, 3 or 4 printable characters.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EncodedField {
    bytes: [u8; 4],
    width: FieldWidth,
}

impl EncodedField {
    pub fn width(&self) -> FieldWidth {
        self.width
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.width.chars()]
    }

    /// The encoded characters; always ASCII in `0x30..=0x6F`.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    /// Decodes the field back into its value.
    pub fn value(&self) -> u32 {
        decode(self.as_bytes())
    }
}

impl fmt::Debug for EncodedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedField({:?})", self.as_str())
    }
}

impl fmt::Display for EncodedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encodes `value` into `width` characters.
///
/// Returns `Error::InvalidArgument` if `value` does not fit in `6 * width` bits.
///
/// # Example
/// ```
/// use hokuyo::codec::{encode, FieldWidth};
/// assert_eq!(encode(0, FieldWidth::Two).unwrap().as_str(), "00");
/// assert_eq!(encode(4095, FieldWidth::Two).unwrap().as_str(), "oo");
/// ```
pub fn encode(value: u32, width: FieldWidth) -> Result<EncodedField> {
    if value > width.max_value() {
        return Err(Error::invalid_argument(format!(
            "{} does not fit in {} encoded characters (max {})",
            value,
            width.chars(),
            width.max_value()
        )));
    }

    let chars = width.chars();
    let mut bytes = [CHAR_OFFSET; 4];
    for (i, byte) in bytes.iter_mut().take(chars).enumerate() {
        let shift = GROUP_BITS * (chars - 1 - i) as u32;
        *byte = ((value >> shift) & GROUP_MASK) as u8 + CHAR_OFFSET;
    }
    Ok(EncodedField { bytes, width })
}

/// Decodes an encoded field of up to 4 characters.
///
/// There is no error path: any input decodes to some value, only the low 6
/// bits of each character (after removing the offset) are used.
#[inline]
pub fn decode(field: &[u8]) -> u32 {
    field.iter().fold(0u32, |acc, &c| {
        (acc << GROUP_BITS) | (u32::from(c.wrapping_sub(CHAR_OFFSET)) & GROUP_MASK)
    })
}

/// Decodes consecutive `width` character groups of `data`.
///
/// A trailing group shorter than `width` is ignored.
pub fn decode_all(data: &[u8], width: FieldWidth) -> Vec<u32> {
    data.chunks_exact(width.chars()).map(decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_all_offset_characters() {
        assert_eq!(encode(0, FieldWidth::Two).unwrap().as_bytes(), b"00");
        assert_eq!(decode(b"00"), 0);
        assert_eq!(encode(0, FieldWidth::Four).unwrap().as_str(), "0000");
    }

    #[test]
    fn most_significant_character_first() {
        // 1234 = 19 * 64 + 18
        let field = encode(1234, FieldWidth::Two).unwrap();
        assert_eq!(field.as_bytes(), &[0x30 + 19, 0x30 + 18]);
        assert_eq!(field.value(), 1234);
    }

    #[test]
    fn three_characters_carry_more_than_twelve_bits() {
        let field = encode(4095, FieldWidth::Three).unwrap();
        assert_eq!(field.as_bytes().len(), 3);
        assert_eq!(decode(field.as_bytes()), 4095);

        let field = encode(5000, FieldWidth::Three).unwrap();
        assert_eq!(decode(field.as_bytes()), 5000);
    }

    #[test]
    fn round_trip_at_the_edges_of_each_width() {
        for width in [FieldWidth::Two, FieldWidth::Three, FieldWidth::Four] {
            let max = width.max_value();
            for v in [0, 1, 63, 64, max / 2, max - 1, max] {
                let field = encode(v, width).unwrap();
                assert_eq!(decode(field.as_bytes()), v, "{:?} {}", width, v);
            }
        }
    }

    #[test]
    fn full_two_character_range_round_trips() {
        for v in 0..=FieldWidth::Two.max_value() {
            assert_eq!(encode(v, FieldWidth::Two).unwrap().value(), v);
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            encode(4096, FieldWidth::Two),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(encode(1 << 18, FieldWidth::Three).is_err());
        assert!(encode(1 << 24, FieldWidth::Four).is_err());
        assert!(encode((1 << 24) - 1, FieldWidth::Four).is_ok());
    }

    #[test]
    fn decode_all_splits_into_groups() {
        let mut data = Vec::new();
        for v in [10u32, 200, 4000] {
            data.extend_from_slice(encode(v, FieldWidth::Three).unwrap().as_bytes());
        }
        data.push(b'0');
        assert_eq!(decode_all(&data, FieldWidth::Three), vec![10, 200, 4000]);
    }

    #[test]
    fn width_lookup() {
        assert_eq!(FieldWidth::from_chars(3), Some(FieldWidth::Three));
        assert_eq!(FieldWidth::from_chars(5), None);
        assert_eq!(FieldWidth::Four.max_value(), 0xFF_FFFF);
    }
}
