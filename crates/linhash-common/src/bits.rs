//! Bit helpers over 32-bit hash values.

/// A 32-bit hash or mask.
pub type Bits = u32;

/// Number of bits in a [`Bits`] value.
pub const MAX_BITS: u32 = 32;

/// Returns the low `width` bits of `value`.
#[inline]
pub fn low_bits(value: Bits, width: u32) -> Bits {
    if width >= MAX_BITS {
        value
    } else {
        value & ((1u32 << width) - 1)
    }
}

/// Returns a mask with the low `width` bits set.
#[inline]
pub fn low_mask(width: u32) -> Bits {
    low_bits(Bits::MAX, width)
}

#[inline]
pub fn bit_is_set(value: Bits, pos: u32) -> bool {
    pos < MAX_BITS && value & (1u32 << pos) != 0
}

#[inline]
pub fn set_bit(value: Bits, pos: u32) -> Bits {
    value | (1u32 << pos)
}

#[inline]
pub fn unset_bit(value: Bits, pos: u32) -> Bits {
    value & !(1u32 << pos)
}

/// Renders `value` high bit first, in groups of eight.
pub fn bits_string(value: Bits) -> String {
    let mut out = String::with_capacity(MAX_BITS as usize + 3);
    for pos in (0..MAX_BITS).rev() {
        out.push(if bit_is_set(value, pos) { '1' } else { '0' });
        if pos % 8 == 0 && pos != 0 {
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_bits() {
        assert_eq!(low_bits(0b1011_0110, 0), 0);
        assert_eq!(low_bits(0b1011_0110, 3), 0b110);
        assert_eq!(low_bits(0b1011_0110, 5), 0b1_0110);
        assert_eq!(low_bits(0xDEAD_BEEF, 32), 0xDEAD_BEEF);
        assert_eq!(low_bits(0xDEAD_BEEF, 40), 0xDEAD_BEEF);
    }

    #[test]
    fn test_low_mask() {
        assert_eq!(low_mask(0), 0);
        assert_eq!(low_mask(4), 0xF);
        assert_eq!(low_mask(32), u32::MAX);
    }

    #[test]
    fn test_set_and_unset() {
        let v = set_bit(0, 31);
        assert!(bit_is_set(v, 31));
        assert!(!bit_is_set(v, 0));
        assert_eq!(unset_bit(v, 31), 0);
        assert_eq!(unset_bit(0b101, 1), 0b101);
        assert!(!bit_is_set(u32::MAX, 32));
    }

    #[test]
    fn test_bits_string() {
        assert_eq!(
            bits_string(1),
            "00000000 00000000 00000000 00000001"
        );
        assert_eq!(
            bits_string(0x8000_00F0),
            "10000000 00000000 00000000 11110000"
        );
    }
}
