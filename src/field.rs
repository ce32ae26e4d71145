//! Bit-field packing for 16-bit registers.
//!
//! A field is described by a contiguous mask; its offset is the mask's
//! trailing-zero count. Signed fields are sign-extended from the field's top
//! bit, so the left-justified value registers of the part (13-bit fields in
//! bits 15..3, 15-bit fields in bits 15..1) decode with an arithmetic shift.

/// Every bit of a register.
pub const FULL_MASK: u16 = 0xFFFF;
/// 13-bit left-justified value field (shunt/bus voltages and all per-channel limits).
pub const VALUE_13_MASK: u16 = 0xFFF8;
/// 15-bit left-justified value field (shunt-voltage sum and sum limit).
pub const VALUE_15_MASK: u16 = 0xFFFE;

/// Number of bits the field is shifted up from bit 0.
#[inline]
pub const fn field_offset(mask: u16) -> u32 {
    mask.trailing_zeros()
}

/// Width of the field in bits.
#[inline]
pub const fn field_width(mask: u16) -> u32 {
    mask.count_ones()
}

fn check_mask(mask: u16) {
    assert!(mask != 0, "register field mask must not be empty");
    let aligned = mask >> field_offset(mask);
    assert!(
        aligned & aligned.wrapping_add(1) == 0,
        "register field mask must be contiguous"
    );
}

/// Pull the field selected by `mask` out of `raw`.
///
/// With `signed` set, the field's top bit is treated as the sign bit.
pub fn extract_field(raw: u16, mask: u16, signed: bool) -> i32 {
    check_mask(mask);
    let offset = field_offset(mask);
    if signed {
        let headroom = 16 - (offset + field_width(mask));
        let aligned = ((raw & mask) << headroom) as i16;
        i32::from(aligned >> (headroom + offset))
    } else {
        i32::from((raw & mask) >> offset)
    }
}

/// Replace the field selected by `mask` in `current` with `value`.
///
/// # Panics
///
/// If `value` does not fit in the field.
pub fn insert_field(current: u16, value: u16, mask: u16) -> u16 {
    check_mask(mask);
    let offset = field_offset(mask);
    assert!(
        value & !(mask >> offset) == 0,
        "value does not fit in register field"
    );
    (current & !mask) | (value << offset)
}

/// Check that `value` fits a signed field `width` bits wide.
///
/// # Panics
///
/// If `value` is outside the signed range of the field.
pub fn fit_signed(value: i32, width: u32) -> i16 {
    assert!((1..=16).contains(&width), "field width must be in 1..=16");
    let min = -(1i32 << (width - 1));
    let max = (1i32 << (width - 1)) - 1;
    assert!(
        (min..=max).contains(&value),
        "signed value out of range for register field"
    );
    value as i16
}

/// Two's-complement encode `value` into the field width of `mask`, unshifted.
///
/// # Panics
///
/// If `value` is outside the signed range of the field.
pub fn encode_signed_field(value: i32, mask: u16) -> u16 {
    check_mask(mask);
    (fit_signed(value, field_width(mask)) as u16) & (mask >> field_offset(mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_justified_fields_keep_their_sign() {
        assert_eq!(extract_field(0x0FF8, VALUE_13_MASK, true), 511);
        assert_eq!(extract_field(0x03F8, VALUE_13_MASK, true), 127);
        assert_eq!(extract_field(0xFFF8, VALUE_13_MASK, true), -1);
        assert_eq!(extract_field(0x8000, VALUE_13_MASK, true), -4096);
        assert_eq!(extract_field(0x7FF8, VALUE_13_MASK, true), 4095);
        assert_eq!(extract_field(0xFFFE, VALUE_15_MASK, true), -1);
        // reserved low bits never leak into the value
        assert_eq!(extract_field(0x0FFF, VALUE_13_MASK, true), 511);
    }

    #[test]
    fn unsigned_extraction_is_a_logical_shift() {
        assert_eq!(extract_field(0xFFF8, VALUE_13_MASK, false), 0x1FFF);
        assert_eq!(extract_field(0x3220, 0xFFF0, false), 0x322);
        assert_eq!(extract_field(0x7127, 0x0E00, false), 0);
        assert_eq!(extract_field(0x7127, 0x0007, false), 7);
    }

    #[test]
    fn signed_fields_below_the_top_bit() {
        // 3-bit field in bits 6..4 holding 0b110
        assert_eq!(extract_field(0x0060, 0x0070, true), -2);
        assert_eq!(extract_field(0x0060, 0x0070, false), 6);
    }

    #[test]
    fn full_mask_reads_whole_word() {
        assert_eq!(extract_field(0x8001, FULL_MASK, false), 0x8001);
        assert_eq!(extract_field(0x8001, FULL_MASK, true), -32767);
    }

    #[test]
    fn insert_clears_only_the_masked_bits() {
        assert_eq!(insert_field(0x7127, 0b000, 0x0007), 0x7120);
        assert_eq!(insert_field(0x7127, 0b011, 0x0E00), 0x7727);
        assert_eq!(insert_field(0x0007, 2500, VALUE_13_MASK), 0x4E27);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn insert_rejects_oversized_values() {
        insert_field(0, 0b1000, 0x0007);
    }

    #[test]
    fn signed_encoding_is_twos_complement_within_width() {
        assert_eq!(encode_signed_field(2500, VALUE_13_MASK), 2500);
        assert_eq!(encode_signed_field(-1, VALUE_13_MASK), 0x1FFF);
        assert_eq!(encode_signed_field(-4096, VALUE_13_MASK), 0x1000);
        assert_eq!(encode_signed_field(-1, VALUE_15_MASK), 0x7FFF);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn signed_encoding_rejects_overflow() {
        encode_signed_field(4096, VALUE_13_MASK);
    }

    #[test]
    fn fit_signed_accepts_the_full_range() {
        assert_eq!(fit_signed(-4096, 13), -4096);
        assert_eq!(fit_signed(4095, 13), 4095);
        assert_eq!(fit_signed(-16384, 15), -16384);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn fit_signed_rejects_overflow() {
        fit_signed(16384, 15);
    }

    #[test]
    #[should_panic(expected = "contiguous")]
    fn split_masks_are_rejected() {
        extract_field(0, 0b1010, false);
    }
}
