// IMPROPER mode: best rational approximation as a single numerator/denominator

use core::fmt::Write;

use super::{float, parse_ratio, FormatState, NumberMode, Text};
use crate::error::ParseError;
use crate::utils::best_rational;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImproperMode;

impl NumberMode for ImproperMode {
    fn format(&self, value: f64, state: &FormatState) -> Text {
        let fraction = best_rational(value, state.epsilon);
        if fraction.is_unrepresentable() {
            return float::render(value);
        }

        let mut text = Text::new();
        if fraction.denominator == 1 {
            write!(&mut text, "{}", fraction.numerator).ok();
        } else {
            write!(&mut text, "{}/{}", fraction.numerator, fraction.denominator).ok();
        }
        state.mark(&mut text, fraction.residual_error);

        text
    }

    fn parse(&self, text: &str, _state: &FormatState) -> Result<f64, ParseError> {
        parse_ratio(text)
    }
}
