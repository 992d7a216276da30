// FLOAT mode: shortest decimal that reads back as the same double

use core::fmt::Write;

use super::{parse_decimal, FormatState, NumberMode, Text};
use crate::error::ParseError;

/// Magnitudes shown positionally, everything else goes exponential
const POSITIONAL_RANGE: core::ops::Range<f64> = 1e-3..1e7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FloatMode;

impl NumberMode for FloatMode {
    fn format(&self, value: f64, _state: &FormatState) -> Text {
        render(value)
    }

    fn parse(&self, text: &str, _state: &FormatState) -> Result<f64, ParseError> {
        parse_decimal(text)
    }
}

/// Locale-independent rendering, also the fallback of the lossy modes
pub fn render(value: f64) -> Text {
    let mut text = Text::new();

    if value == 0.0 {
        text.push('0').ok();
    } else if !value.is_finite() || POSITIONAL_RANGE.contains(&value.abs()) {
        write!(&mut text, "{value}").ok();
    } else {
        write!(&mut text, "{value:e}").ok();
    }

    text
}
