// Bit-level helpers for the HEX display mode
// Field widths are whole nibble counts that are powers of two: 4, 8, 16, 32 or 64 bits

/// Widths a sign-cropped value may occupy, narrowest first
const FIELD_WIDTHS: [u32; 5] = [4, 8, 16, 32, 64];

/// Index of the highest set bit, i.e. `floor(log2(v))` for positive `v`.
///
/// Non-positive values read as unsigned 64-bit patterns with the top bit set,
/// so they report the highest index (63).
pub fn find_first_one(v: i64) -> i32 {
    if v <= 0 {
        return 63;
    }

    63 - v.leading_zeros() as i32
}

/// Crop a negative two's-complement value down to the narrowest field width
/// it is the sign extension of. Non-negative values are returned unchanged.
///
/// `-1` becomes `0xf`, `-9` becomes `0xf7`, `-129` becomes `0xff7f`.
pub fn sign_crop(v: i64) -> i64 {
    if v >= 0 {
        return v;
    }

    for width in FIELD_WIDTHS {
        if width == 64 {
            break;
        }

        let min = -(1i64 << (width - 1));
        if v >= min {
            return v & ((1i64 << width) - 1);
        }
    }

    v
}

/// Inverse of [`sign_crop`]: treat the highest set bit of a narrow positive
/// pattern as the sign bit of its field and extend it to 64 bits.
///
/// The field is the narrowest width holding every significant bit, so `0x7`
/// stays `7` while `0xf` becomes `-1` and `0x10` stays `16`.
pub fn sign_extend(v: i64) -> i64 {
    if v <= 0 {
        return v;
    }

    let top = find_first_one(v) as u32;
    let width = FIELD_WIDTHS
        .iter()
        .copied()
        .find(|width| *width > top)
        .unwrap_or(64);

    if width < 64 && top == width - 1 {
        v - (1i64 << width)
    } else {
        v
    }
}
