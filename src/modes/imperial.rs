// MIXIMPERIAL mode: whole part plus a power-of-two fraction, inch style

use core::fmt::Write;

use super::{float, parse_decimal, parse_ratio, FormatState, NumberMode, Text};
use crate::error::ParseError;
use crate::utils::imperial_approx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MixImperialMode;

impl NumberMode for MixImperialMode {
    fn format(&self, value: f64, state: &FormatState) -> Text {
        let fraction = imperial_approx(value, state.epsilon);
        if fraction.is_unrepresentable() {
            return float::render(value);
        }

        let (numerator, denominator) = (fraction.numerator, fraction.denominator);
        let whole = numerator / denominator;
        let remainder = (numerator % denominator).abs();
        let sign = if numerator < 0 { "-" } else { "" };

        let mut text = Text::new();
        if remainder == 0 {
            write!(&mut text, "{whole}").ok();
        } else if whole == 0 {
            write!(&mut text, "{sign}{remainder}/{denominator}").ok();
        } else {
            write!(&mut text, "{whole} - {remainder}/{denominator}").ok();
        }
        state.mark(&mut text, fraction.residual_error);

        text
    }

    /// Accepts `w - n/d`, `w n/d`, `n/d` or a decimal. A leading minus
    /// negates the whole mixed number.
    fn parse(&self, text: &str, _state: &FormatState) -> Result<f64, ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        let (negative, body) = match text.strip_prefix('-') {
            Some(body) => (true, body.trim_start()),
            None => (false, text),
        };
        if body.starts_with('-') {
            return Err(ParseError::Malformed);
        }

        let mut parts = body.split_whitespace().filter(|part| *part != "-");
        let magnitude = match (parts.next(), parts.next(), parts.next()) {
            (Some(single), None, None) => parse_ratio(single)?,
            (Some(whole), Some(fraction), None) if fraction.contains('/') => {
                let whole = parse_decimal(whole)?;
                let fraction = parse_ratio(fraction)?;
                if whole.fract() != 0.0 || fraction < 0.0 {
                    return Err(ParseError::Malformed);
                }
                whole + fraction
            }
            (None, _, _) => return Err(ParseError::Empty),
            _ => return Err(ParseError::Malformed),
        };

        Ok(if negative { -magnitude } else { magnitude })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sixteenths() -> FormatState {
        FormatState::default().with_epsilon(1.0 / 16.0)
    }

    #[test]
    fn test_format() {
        let state = sixteenths();
        assert_eq!(MixImperialMode.format(3.25, &state), "3 - 1/4");
        assert_eq!(MixImperialMode.format(-3.25, &state), "-3 - 1/4");
        assert_eq!(MixImperialMode.format(0.375, &state), "3/8");
        assert_eq!(MixImperialMode.format(-0.375, &state), "-3/8");
        assert_eq!(MixImperialMode.format(4.0, &state), "4");
        assert_eq!(MixImperialMode.format(3.3, &state), "3 - 5/16~");
        assert_eq!(MixImperialMode.format(0.01, &state), "0~");
    }

    #[test]
    fn test_parse() {
        let state = sixteenths();
        assert_eq!(MixImperialMode.parse("3 - 1/4", &state), Ok(3.25));
        assert_eq!(MixImperialMode.parse("3 1/4", &state), Ok(3.25));
        assert_eq!(MixImperialMode.parse("-3 - 1/4", &state), Ok(-3.25));
        assert_eq!(MixImperialMode.parse("-3/8", &state), Ok(-0.375));
        assert_eq!(MixImperialMode.parse("2.5", &state), Ok(2.5));
        assert_eq!(MixImperialMode.parse("3.5 1/4", &state), Err(ParseError::Malformed));
        assert_eq!(MixImperialMode.parse("1 2 3", &state), Err(ParseError::Malformed));
        assert_eq!(MixImperialMode.parse("--3", &state), Err(ParseError::Malformed));
    }

    #[test]
    fn test_round_trip() {
        let state = sixteenths();
        for value in [3.25, -3.25, 0.0625, -7.5, 12.0] {
            let text = MixImperialMode.format(value, &state);
            assert_eq!(MixImperialMode.parse(&text, &state), Ok(value), "{text}");
        }
    }
}
