// TIME mode: decimal hours shown as H:MM

use core::fmt::Write;

use super::{float, parse_decimal, FormatState, NumberMode, Text};
use crate::error::ParseError;

/// Hours past this lose minute resolution in an f64
const MAX_HOURS: f64 = 1e13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeMode;

/// Decimal hours as `H:MM`, rounded to the nearest minute, sign kept
pub fn time_string(hours: f64) -> Text {
    let minutes = (hours.abs() * 60.0).round() as u64;
    let sign = if hours < 0.0 && minutes > 0 { "-" } else { "" };

    let mut text = Text::new();
    write!(&mut text, "{sign}{}:{:02}", minutes / 60, minutes % 60).ok();
    text
}

impl NumberMode for TimeMode {
    fn format(&self, value: f64, state: &FormatState) -> Text {
        if !value.is_finite() || value.abs() > MAX_HOURS {
            return float::render(value);
        }

        let shown = (value * 60.0).round() / 60.0;
        let mut text = time_string(value);
        state.mark(&mut text, value - shown);

        text
    }

    /// `[-]H:MM` with minutes below 60, or decimal hours
    fn parse(&self, text: &str, _state: &FormatState) -> Result<f64, ParseError> {
        let text = text.trim();
        let Some((hours, minutes)) = text.split_once(':') else {
            return parse_decimal(text);
        };

        let (negative, hours) = match hours.strip_prefix('-') {
            Some(hours) => (true, hours),
            None => (false, hours),
        };

        let digits = |part: &str| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit());
        if !digits(hours) || !digits(minutes) || minutes.len() != 2 {
            return Err(ParseError::Malformed);
        }

        let hours: u64 = hours.parse().map_err(|_| ParseError::Overflow)?;
        let minutes: u64 = minutes.parse().map_err(|_| ParseError::Malformed)?;
        if minutes >= 60 {
            return Err(ParseError::Malformed);
        }

        let value = hours as f64 + minutes as f64 / 60.0;
        Ok(if negative { -value } else { value })
    }
}
