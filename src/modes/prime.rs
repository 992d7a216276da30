// PRIME mode: decimal value followed by its prime factorization

use core::fmt::Write;

use super::{float, parse_decimal, FormatState, NumberMode, Text};
use crate::error::ParseError;
use crate::utils::factorize;

/// Integers from here on cannot be held by `i64`
const INTEGER_LIMIT: f64 = 9223372036854775808.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrimeMode;

impl NumberMode for PrimeMode {
    fn format(&self, value: f64, _state: &FormatState) -> Text {
        if !value.is_finite() || value.fract() != 0.0 || value.abs() >= INTEGER_LIMIT {
            return float::render(value);
        }

        let n = value as i64;
        let factorization = factorize(n);

        let mut text = Text::new();
        if factorization.is_trivial() {
            write!(&mut text, "{factorization}").ok();
        } else {
            write!(&mut text, "{n} = {factorization}").ok();
        }

        text
    }

    fn parse(&self, text: &str, _state: &FormatState) -> Result<f64, ParseError> {
        parse_decimal(text)
    }
}
