// FIX and SCI modes: a set number of decimal places, positional or scientific

use core::fmt::Write;

use rust_decimal::{Decimal, RoundingStrategy};

use super::{float, parse_decimal, FormatState, NumberMode, Text, MAX_DECIMAL_PLACES};
use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FixMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SciMode;

impl NumberMode for FixMode {
    /// Rounds half away from zero on the shortest decimal form of the value,
    /// so 2.675 at two places is 2.68. Falls back to SCI when it does not fit.
    fn format(&self, value: f64, state: &FormatState) -> Text {
        if !value.is_finite() {
            return float::render(value);
        }

        let places = state.decimal_places.min(MAX_DECIMAL_PLACES);

        let mut text = Text::new();
        let written = match round_decimal(value, places) {
            Some(decimal) => write!(&mut text, "{decimal}"),
            None => write!(&mut text, "{value:.*}", places as usize),
        };

        if written.is_err() {
            return scientific(value, places);
        }

        text
    }

    fn parse(&self, text: &str, _state: &FormatState) -> Result<f64, ParseError> {
        parse_decimal(text)
    }
}

impl NumberMode for SciMode {
    fn format(&self, value: f64, state: &FormatState) -> Text {
        if !value.is_finite() {
            return float::render(value);
        }

        scientific(value, state.decimal_places.min(MAX_DECIMAL_PLACES))
    }

    fn parse(&self, text: &str, _state: &FormatState) -> Result<f64, ParseError> {
        parse_decimal(text)
    }
}

fn scientific(value: f64, places: u32) -> Text {
    let mut text = Text::new();
    write!(&mut text, "{value:.*e}", places as usize).ok();
    text
}

/// `None` when the value is outside what `Decimal` can carry
fn round_decimal(value: f64, places: u32) -> Option<Decimal> {
    let mut shortest = Text::new();
    write!(&mut shortest, "{value}").ok()?;
    let decimal = shortest.parse::<Decimal>().ok()?;

    let mut rounded = decimal.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded.rescale(places);

    Some(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn places(n: u32) -> FormatState {
        FormatState::default().with_decimal_places(n)
    }

    #[test]
    fn test_fix() {
        assert_eq!(FixMode.format(3.14159, &places(2)), "3.14");
        assert_eq!(FixMode.format(2.675, &places(2)), "2.68");
        assert_eq!(FixMode.format(-2.675, &places(2)), "-2.68");
        assert_eq!(FixMode.format(2.5, &places(3)), "2.500");
        assert_eq!(FixMode.format(7.0, &places(0)), "7");
        assert_eq!(FixMode.format(-0.0001, &places(2)), "0.00");
        assert_eq!(FixMode.format(1e70, &places(2)), "1.00e70");
        assert_eq!(FixMode.format(0.125, &places(2)), "0.13");
        assert_eq!(FixMode.format(f64::NEG_INFINITY, &places(2)), "-inf");
    }

    #[test]
    fn test_sci() {
        assert_eq!(SciMode.format(12345.678, &places(2)), "1.23e4");
        assert_eq!(SciMode.format(-0.00012, &places(1)), "-1.2e-4");
        assert_eq!(SciMode.format(0.0, &places(2)), "0.00e0");
    }

    #[test]
    fn test_parse() {
        assert_eq!(FixMode.parse("2.68", &places(2)), Ok(2.68));
        assert_eq!(SciMode.parse("1.23e4", &places(2)), Ok(12300.0));
        assert_eq!(SciMode.parse("1..2", &places(2)), Err(ParseError::Malformed));
    }
}
