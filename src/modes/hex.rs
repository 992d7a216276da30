// HEX mode: integer part as a 64-bit two's-complement pattern

use core::fmt::Write;

use super::{FormatState, NumberMode, Text};
use crate::error::ParseError;
use crate::utils::{sign_crop, sign_extend};

/// How many nibbles a negative pattern occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HexWidth {
    /// Always the full 64-bit pattern, -1 is `0xffffffffffffffff`
    #[default]
    Full,
    /// Narrowest nibble-aligned field the value is the sign extension of, -1 is `0xf`.
    /// Positive patterns whose top digit would read as a sign get a leading `0`,
    /// 15 is `0x0f`.
    Narrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HexMode;

impl NumberMode for HexMode {
    fn format(&self, value: f64, state: &FormatState) -> Text {
        let truncated = value.trunc();
        // Saturates out of range, NaN becomes 0
        let pattern = truncated as i64;

        let mut text = Text::new();
        match state.hex_width {
            HexWidth::Full => write!(&mut text, "0x{:x}", pattern as u64),
            // A zero nibble keeps a positive pattern from reading as negative
            HexWidth::Narrow if pattern >= 0 && sign_extend(pattern) != pattern => {
                write!(&mut text, "0x0{:x}", pattern)
            }
            HexWidth::Narrow => write!(&mut text, "0x{:x}", sign_crop(pattern) as u64),
        }
        .ok();

        let residual = if value.is_finite() && (truncated as i64) as f64 == truncated {
            value - truncated
        } else {
            f64::NAN
        };
        state.mark(&mut text, residual);

        text
    }

    fn parse(&self, text: &str, state: &FormatState) -> Result<f64, ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::Empty);
        }
        if text.starts_with("0x") || text.starts_with("0X") {
            return Err(ParseError::HexPrefix);
        }
        if text.contains('.') {
            return Err(ParseError::Fractional);
        }
        if !text.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(ParseError::Malformed);
        }

        let bits = u64::from_str_radix(text, 16).map_err(|_| ParseError::Overflow)?;
        // Top bit is the sign
        let pattern = bits as i64;

        let value = match state.hex_width {
            HexWidth::Narrow if !text.starts_with('0') => sign_extend(pattern),
            _ => pattern,
        };

        Ok(value as f64)
    }
}
