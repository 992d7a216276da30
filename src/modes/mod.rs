// Display modes: one formatter/parser strategy per way of showing a number
// The set is closed, so dispatch is a generated match over DisplayMode

use core::fmt;
use core::str::FromStr;

use enum_dispatch::enum_dispatch;

use crate::error::ParseError;

pub mod calculator;
pub mod fixed;
pub mod float;
pub mod hex;
pub mod imperial;
pub mod improper;
pub mod prime;
pub mod time;

pub use fixed::{FixMode, SciMode};
pub use float::FloatMode;
pub use hex::{HexMode, HexWidth};
pub use imperial::MixImperialMode;
pub use improper::ImproperMode;
pub use prime::PrimeMode;
pub use time::{time_string, TimeMode};

/// Bytes of rendered text per value, longer renderings are cut off
pub const DISPLAY_CAPACITY: usize = 64;

/// Upper bound for FIX/SCI decimal places
pub const MAX_DECIMAL_PLACES: u32 = 15;

/// Suffix for values whose rendering is not exact
pub const APPROX_MARKER: &str = "~";

/// Rendered value, sized for one display line
pub type Text = heapless::String<DISPLAY_CAPACITY>;

/// Formatter and parser for one display mode
#[enum_dispatch]
pub trait NumberMode {
    /// Render `value` for display
    fn format(&self, value: f64, state: &FormatState) -> Text;

    /// Read typed `text` back into a value
    fn parse(&self, text: &str, state: &FormatState) -> Result<f64, ParseError>;
}

#[enum_dispatch(NumberMode)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayMode {
    Float(FloatMode),
    Hex(HexMode),
    Improper(ImproperMode),
    MixImperial(MixImperialMode),
    Prime(PrimeMode),
    Fix(FixMode),
    Sci(SciMode),
    Time(TimeMode),
}

impl DisplayMode {
    pub const FLOAT: Self = Self::Float(FloatMode);
    pub const HEX: Self = Self::Hex(HexMode);
    pub const IMPROPER: Self = Self::Improper(ImproperMode);
    pub const MIXIMPERIAL: Self = Self::MixImperial(MixImperialMode);
    pub const PRIME: Self = Self::Prime(PrimeMode);
    pub const FIX: Self = Self::Fix(FixMode);
    pub const SCI: Self = Self::Sci(SciMode);
    pub const TIME: Self = Self::Time(TimeMode);

    pub const ALL: [Self; 8] = [
        Self::FLOAT,
        Self::HEX,
        Self::IMPROPER,
        Self::MIXIMPERIAL,
        Self::PRIME,
        Self::FIX,
        Self::SCI,
        Self::TIME,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Float(_) => "FLOAT",
            Self::Hex(_) => "HEX",
            Self::Improper(_) => "IMPROPER",
            Self::MixImperial(_) => "MIXIMPERIAL",
            Self::Prime(_) => "PRIME",
            Self::Fix(_) => "FIX",
            Self::Sci(_) => "SCI",
            Self::Time(_) => "TIME",
        }
    }
}

impl Default for DisplayMode {
    fn default() -> Self {
        Self::FLOAT
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DisplayMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(ParseError::Malformed)
    }
}

/// Formatting parameters of a session, replaced as a whole on change
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FormatState {
    /// Error tolerance for fractions, its square is the "exact enough" threshold
    pub epsilon: f64,
    /// Digits after the point in FIX and SCI
    pub decimal_places: u32,
    pub mode: DisplayMode,
    pub hex_width: HexWidth,
}

impl FormatState {
    pub fn with_mode(self, mode: DisplayMode) -> Self {
        Self { mode, ..self }
    }

    pub fn with_epsilon(self, epsilon: f64) -> Self {
        Self { epsilon, ..self }
    }

    pub fn with_decimal_places(self, decimal_places: u32) -> Self {
        Self {
            decimal_places: decimal_places.min(MAX_DECIMAL_PLACES),
            ..self
        }
    }

    pub fn with_hex_width(self, hex_width: HexWidth) -> Self {
        Self { hex_width, ..self }
    }

    /// Render with the active mode
    pub fn format(&self, value: f64) -> Text {
        self.mode.format(value, self)
    }

    /// Parse with the active mode
    pub fn parse(&self, text: &str) -> Result<f64, ParseError> {
        self.mode.parse(text, self)
    }

    /// Whether a lossy step left more error than the display may hide
    fn is_approximate(&self, residual: f64) -> bool {
        residual.is_nan() || residual.abs() > self.epsilon * self.epsilon
    }

    /// Append [`APPROX_MARKER`] when `residual` is not negligible
    fn mark(&self, text: &mut Text, residual: f64) {
        if self.is_approximate(residual) {
            text.push_str(APPROX_MARKER).ok();
        }
    }
}

impl Default for FormatState {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            decimal_places: 4,
            mode: DisplayMode::default(),
            hex_width: HexWidth::default(),
        }
    }
}

/// Decimal float syntax: digits, one point, optional sign and exponent
pub(crate) fn parse_decimal(text: &str) -> Result<f64, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    // Keep "inf" and "nan" out, the keypad cannot type them
    if !text
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'))
    {
        return Err(ParseError::Malformed);
    }

    text.parse::<f64>().map_err(|_| ParseError::Malformed)
}

/// `numerator/denominator` or a plain decimal
pub(crate) fn parse_ratio(text: &str) -> Result<f64, ParseError> {
    let Some((numerator, denominator)) = text.trim().split_once('/') else {
        return parse_decimal(text);
    };

    let numerator = parse_decimal(numerator)?;
    let denominator = parse_decimal(denominator)?;
    if denominator == 0.0 {
        return Err(ParseError::ZeroDenominator);
    }

    Ok(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names() {
        for mode in DisplayMode::ALL {
            assert_eq!(mode.name().parse::<DisplayMode>(), Ok(mode));
        }
        assert_eq!("miximperial".parse::<DisplayMode>(), Ok(DisplayMode::MIXIMPERIAL));
        assert_eq!("RADIX".parse::<DisplayMode>(), Err(ParseError::Malformed));
        assert_eq!(DisplayMode::default().to_string(), "FLOAT");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("3.1"), Ok(3.1));
        assert_eq!(parse_decimal("-2"), Ok(-2.0));
        assert_eq!(parse_decimal(".5"), Ok(0.5));
        assert_eq!(parse_decimal("1e3"), Ok(1000.0));
        assert_eq!(parse_decimal(""), Err(ParseError::Empty));
        assert_eq!(parse_decimal("."), Err(ParseError::Malformed));
        assert_eq!(parse_decimal("1.2.3"), Err(ParseError::Malformed));
        assert_eq!(parse_decimal("inf"), Err(ParseError::Malformed));
        assert_eq!(parse_decimal("-"), Err(ParseError::Malformed));
    }

    #[test]
    fn test_parse_ratio() {
        assert_eq!(parse_ratio("3/4"), Ok(0.75));
        assert_eq!(parse_ratio("-3/4"), Ok(-0.75));
        assert_eq!(parse_ratio("2.5"), Ok(2.5));
        assert_eq!(parse_ratio("3/0"), Err(ParseError::ZeroDenominator));
        assert_eq!(parse_ratio("3/"), Err(ParseError::Empty));
    }

    #[test]
    fn test_decimal_places_clamped() {
        let state = FormatState::default().with_decimal_places(40);
        assert_eq!(state.decimal_places, MAX_DECIMAL_PLACES);
    }
}
