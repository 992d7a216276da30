// Rational approximation of doubles
// Continued fractions for IMPROPER display, power-of-two denominators for MIXIMPERIAL

/// Magnitudes beyond this cannot be expressed as `i64` fractions with any slack
const MAX_MAGNITUDE: f64 = 1e18;

/// Upper bound on continued-fraction terms
const MAX_TERMS: u32 = 100;

/// Remainders above this would overflow the next term's `floor`
const TERM_OVERFLOW: f64 = 2147483648.0;

/// An approximation `numerator / denominator` of some source value.
///
/// `residual_error` is `source - numerator / denominator`. A zero denominator
/// is the "unrepresentable" sentinel, see [`Fraction::UNREPRESENTABLE`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fraction {
    pub numerator: i64,
    pub denominator: i64,
    pub residual_error: f64,
}

impl Fraction {
    /// No rational approximation could be found under the given constraints
    pub const UNREPRESENTABLE: Self = Self::new(0, 0, 0.0);

    pub const fn new(numerator: i64, denominator: i64, residual_error: f64) -> Self {
        Self {
            numerator,
            denominator,
            residual_error,
        }
    }

    pub fn is_unrepresentable(&self) -> bool {
        self.denominator == 0
    }

    /// Same numerator and denominator, residual errors within `tolerance`
    pub fn is_near(&self, other: &Fraction, tolerance: f64) -> bool {
        self.numerator == other.numerator
            && self.denominator == other.denominator
            && (self.residual_error - other.residual_error).abs() <= tolerance
    }

    /// The approximated value, `NaN` for the sentinel
    pub fn value(&self) -> f64 {
        if self.is_unrepresentable() {
            return f64::NAN;
        }

        self.numerator as f64 / self.denominator as f64
    }

    /// Move the sign onto the numerator
    fn normalized(self) -> Self {
        if self.denominator >= 0 {
            return self;
        }

        match (self.numerator.checked_neg(), self.denominator.checked_neg()) {
            (Some(numerator), Some(denominator)) => Self::new(numerator, denominator, self.residual_error),
            _ => Self::UNREPRESENTABLE,
        }
    }

    /// `floor(x) / 1`, used when no continued-fraction term fits
    fn whole(x: f64) -> Self {
        let whole = x.floor();
        Self::new(whole as i64, 1, x - whole)
    }

    fn approximating(x: f64, numerator: i64, denominator: i64) -> Self {
        Self::new(numerator, denominator, x - numerator as f64 / denominator as f64)
    }
}

/// Best rational approximation of `x` under error tolerance `epsilon`.
///
/// Best approximations with denominator `d` sit about `1 / d^2` away from `x`,
/// so denominators are bounded by `1 / sqrt(epsilon)`. The continued fraction
/// of `x` is folded into the continuant matrix term by term until the next
/// denominator would exceed that bound, the expansion is exact, or the
/// remainder overflows. The last convergent then competes with the largest
/// semiconvergent that still fits the bound; the closer one wins and ties go
/// to the semiconvergent.
///
/// A zero `epsilon` lifts the bound entirely. A negative one admits no terms,
/// leaving `floor(x) / 1`. Non-finite input and magnitudes beyond `1e18` give
/// [`Fraction::UNREPRESENTABLE`].
pub fn best_rational(x: f64, epsilon: f64) -> Fraction {
    if !x.is_finite() || x.abs() > MAX_MAGNITUDE {
        return Fraction::UNREPRESENTABLE;
    }

    if !(epsilon >= 0.0) {
        return Fraction::whole(x);
    }

    let max_den = 1.0 / epsilon.sqrt();

    // Continuant matrix, starts as identity
    let (mut m00, mut m01, mut m10, mut m11) = (1i64, 0i64, 0i64, 1i64);
    let mut rest = x;
    let mut converged = false;
    let mut loops = 0;

    while loops < MAX_TERMS {
        let term_f = rest.floor();
        let term = term_f as i64;

        let Some(den) = m10.checked_mul(term).and_then(|d| d.checked_add(m11)) else {
            break;
        };
        if den as f64 > max_den {
            break;
        }
        let Some(num) = m00.checked_mul(term).and_then(|n| n.checked_add(m01)) else {
            break;
        };

        (m00, m01) = (num, m00);
        (m10, m11) = (den, m10);
        loops += 1;

        // Exact rational, another step would divide by zero
        if rest == term_f {
            converged = true;
            break;
        }

        rest = 1.0 / (rest - term_f);
        if rest > TERM_OVERFLOW {
            break;
        }
    }

    if m10 == 0 {
        return Fraction::whole(x);
    }

    let convergent = Fraction::approximating(x, m00, m10);
    if converged {
        return convergent.normalized();
    }

    // Largest extra term that keeps the denominator within bounds
    let steps = ((max_den - m11 as f64) / m10 as f64).floor();
    let semiconvergent = if steps.is_finite() && steps >= 0.0 && steps < i64::MAX as f64 {
        let steps = steps as i64;
        let num = m00.checked_mul(steps).and_then(|n| n.checked_add(m01));
        let den = m10.checked_mul(steps).and_then(|d| d.checked_add(m11));

        match (num, den) {
            (Some(num), Some(den)) if den != 0 => Some(Fraction::approximating(x, num, den)),
            _ => None,
        }
    } else {
        None
    };

    match semiconvergent {
        Some(candidate) if candidate.residual_error.abs() <= convergent.residual_error.abs() => {
            candidate.normalized()
        }
        _ => convergent.normalized(),
    }
}

/// Greatest common divisor by Euclid.
///
/// Returns 1 whenever either operand is non-positive so that callers reducing
/// a fraction never divide by zero.
pub fn gcd(a: i64, b: i64) -> i64 {
    if a <= 0 || b <= 0 {
        return 1;
    }

    let (mut a, mut b) = (a, b);
    while b != 0 {
        (a, b) = (b, a % b);
    }

    a
}

/// Least common multiple, 1 whenever either operand is non-positive
pub fn lcm(a: i64, b: i64) -> i64 {
    if a <= 0 || b <= 0 {
        return 1;
    }

    (a / gcd(a, b)).saturating_mul(b)
}

/// Approximate `x` with a power-of-two denominator no coarser than `epsilon`.
///
/// The denominator starts at `2^ceil(log2(1 / epsilon))` and is reduced by the
/// common factor with the rounded numerator. Zero always comes out as `0/1`.
/// An `epsilon` above 2 leaves no fractional resolution and `x` is rounded to
/// a whole number instead.
pub fn imperial_approx(x: f64, epsilon: f64) -> Fraction {
    if !x.is_finite() || x.abs() > MAX_MAGNITUDE {
        return Fraction::UNREPRESENTABLE;
    }

    let scale = (1.0 / epsilon).log2().ceil().exp2().round();
    if !(scale >= 1.0) {
        let whole = x.round();
        return Fraction::new(whole as i64, 1, x - whole);
    }

    let scaled = (x * scale).round();
    if !scaled.is_finite() || scaled.abs() > MAX_MAGNITUDE || scale > MAX_MAGNITUDE {
        return Fraction::UNREPRESENTABLE;
    }

    let (numerator, denominator) = (scaled as i64, scale as i64);
    let divisor = gcd(numerator.abs(), denominator);

    if numerator == 0 {
        return Fraction::new(0, divisor, x);
    }

    Fraction::approximating(x, numerator / divisor, denominator / divisor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::PI;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_exact_fraction() {
        assert!(best_rational(2.75, 1e-4).is_near(&Fraction::new(11, 4, 0.0), 0.0));
        assert!(best_rational(-2.75, 1e-4).is_near(&Fraction::new(-11, 4, 0.0), 0.0));
        assert!(best_rational(22.0 / 7.0, 1e-4).is_near(&Fraction::new(22, 7, 0.0), 1e-4));
    }

    #[test]
    fn test_pi() {
        let fraction = best_rational(PI, 1e-6);
        assert!(fraction.is_near(&Fraction::new(355, 113, -2.67e-7), 1e-9), "{fraction:?}");

        // Coarser tolerance stops at 22/7
        let fraction = best_rational(PI, 2e-3);
        assert_eq!((fraction.numerator, fraction.denominator), (22, 7));
    }

    #[test]
    fn test_zero() {
        assert_eq!(best_rational(0.0, 1e-4), Fraction::new(0, 1, 0.0));
    }

    #[test]
    fn test_denominator_bound_uses_semiconvergent() {
        // sqrt(2) = [1; 2, 2, 2, ...], convergents 1, 3/2, 7/5, 17/12, 41/29
        let fraction = best_rational(2f64.sqrt(), 1.0 / 400.0);
        assert!(fraction.denominator <= 20);
        assert_eq!((fraction.numerator, fraction.denominator), (24, 17));
    }

    #[test]
    fn test_zero_epsilon_is_precise() {
        let fraction = best_rational(PI, 0.0);
        assert!(!fraction.is_unrepresentable());
        assert!(fraction.residual_error.abs() < 1e-15);
    }

    #[test]
    fn test_negative_epsilon_gives_whole_part() {
        assert_eq!(best_rational(2.75, -1.0), Fraction::new(2, 1, 0.75));
        assert_eq!(best_rational(-2.25, -1.0), Fraction::new(-3, 1, 0.75));
    }

    #[test]
    fn test_unrepresentable() {
        assert!(best_rational(1e19, 1e-4).is_unrepresentable());
        assert!(best_rational(f64::NAN, 1e-4).is_unrepresentable());
        assert!(best_rational(f64::INFINITY, 1e-4).is_unrepresentable());
        assert!(best_rational(1e-20, 1e-4).is_near(&Fraction::new(0, 1, 1e-20), 1e-30));
    }

    #[test]
    fn test_gcd_lcm() {
        assert_eq!(gcd(6, 8), 2);
        assert_eq!(gcd(8, 6), 2);
        assert_eq!(gcd(0, 0), 1);
        assert_eq!(gcd(355, 0), 1);
        assert_eq!(gcd(-4, 8), 1);
        assert_eq!(gcd(17, 5), 1);
        assert_eq!(lcm(3, 5), 15);
        assert_eq!(lcm(4, 6), 12);
        assert_eq!(lcm(0, 6), 1);
    }

    #[test]
    fn test_imperial() {
        assert_eq!(imperial_approx(3.25, 1.0 / 16.0), Fraction::new(13, 4, 0.0));
        assert_eq!(imperial_approx(-3.25, 1.0 / 16.0), Fraction::new(-13, 4, 0.0));
        assert_eq!(imperial_approx(0.0, 1.0 / 16.0), Fraction::new(0, 1, 0.0));
        assert_eq!(imperial_approx(0.01, 1.0 / 16.0), Fraction::new(0, 1, 0.01));

        let fraction = imperial_approx(3.3, 1.0 / 16.0);
        assert_eq!((fraction.numerator, fraction.denominator), (53, 16));
        assert!((fraction.residual_error + 0.0125).abs() < 1e-12);

        // No fractional resolution left
        assert_eq!(imperial_approx(2.6, 8.0), Fraction::new(3, 1, 2.6 - 3.0));
        assert!(imperial_approx(1.5, 0.0).is_unrepresentable());
    }

    #[quickcheck]
    fn residual_matches_fraction(x: f64, tolerance: u16) -> bool {
        let epsilon = 1.0 / (tolerance as f64 + 2.0).powi(2);
        let fraction = best_rational(x, epsilon);
        if fraction.is_unrepresentable() {
            return !x.is_finite() || x.abs() > MAX_MAGNITUDE;
        }

        let reconstructed = fraction.numerator as f64 / fraction.denominator as f64;
        fraction.denominator > 0
            && fraction.denominator as f64 <= 1.0 / epsilon.sqrt() + 1e-6
            && (x - reconstructed - fraction.residual_error).abs() <= 1e-9 * x.abs().max(1.0)
    }
}
