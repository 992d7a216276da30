// Prime factorization for the PRIME display mode
// Plain trial division: inputs are typed calculator values, not a throughput target

use core::fmt;

/// A 64-bit magnitude has at most 15 distinct prime factors
const MAX_DISTINCT_PRIMES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sign {
    Positive,
    Negative,
}

/// One `prime^exponent` term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrimePower {
    pub prime: i64,
    pub exponent: u32,
}

/// Signed factorization, primes ascending. Zero and one have no factors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factorization {
    pub sign: Sign,
    /// Magnitude of the factored value, kept to render 0 and 1
    magnitude: u64,
    pub factors: heapless::Vec<PrimePower, MAX_DISTINCT_PRIMES>,
}

impl Factorization {
    pub fn is_trivial(&self) -> bool {
        self.factors.is_empty()
    }

    /// Multiply the factors back together, sign included
    pub fn product(&self) -> i128 {
        let magnitude = if self.factors.is_empty() {
            self.magnitude as i128
        } else {
            self.factors
                .iter()
                .map(|power| (power.prime as i128).pow(power.exponent))
                .product()
        };

        match self.sign {
            Sign::Positive => magnitude,
            Sign::Negative => -magnitude,
        }
    }
}

impl fmt::Display for Factorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign == Sign::Negative {
            write!(f, "-")?;
        }

        if self.factors.is_empty() {
            return write!(f, "{}", self.magnitude);
        }

        for (i, power) in self.factors.iter().enumerate() {
            if i > 0 {
                write!(f, "*")?;
            }

            match power.exponent {
                1 => write!(f, "{}", power.prime)?,
                exponent => write!(f, "{}^{exponent}", power.prime)?,
            }
        }

        Ok(())
    }
}

/// Factor `n` by trial division: 2 first, then odd candidates up to `sqrt(|n|)`.
/// Whatever cofactor survives the loop is prime.
pub fn factorize(n: i64) -> Factorization {
    let sign = if n < 0 { Sign::Negative } else { Sign::Positive };
    let magnitude = n.unsigned_abs();
    let mut factors = heapless::Vec::new();

    if magnitude < 2 {
        return Factorization {
            sign,
            magnitude,
            factors,
        };
    }

    let mut rest = magnitude;
    let mut candidate = 2u64;

    while candidate.checked_mul(candidate).is_some_and(|square| square <= rest) {
        let mut exponent = 0;
        while rest % candidate == 0 {
            rest /= candidate;
            exponent += 1;
        }

        if exponent > 0 {
            push_factor(&mut factors, candidate, exponent);
        }

        candidate = if candidate == 2 { 3 } else { candidate + 2 };
    }

    if rest > 1 {
        push_factor(&mut factors, rest, 1);
    }

    Factorization {
        sign,
        magnitude,
        factors,
    }
}

fn push_factor(factors: &mut heapless::Vec<PrimePower, MAX_DISTINCT_PRIMES>, prime: u64, exponent: u32) {
    // Every prime factor of a magnitude up to 2^63 fits i64, and there are
    // fewer distinct ones than the vector holds
    let power = PrimePower {
        prime: prime as i64,
        exponent,
    };

    if factors.push(power).is_err() {
        log::error!("Factorization overflow at prime {prime}");
    }
}
