pub mod bits;
pub mod fraction;
pub mod primes;

pub use bits::{find_first_one, sign_crop, sign_extend};
pub use fraction::{best_rational, gcd, imperial_approx, lcm, Fraction};
pub use primes::{factorize, Factorization, PrimePower, Sign};
