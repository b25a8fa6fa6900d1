//! Exact rational numbers for just-intonation intervals

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reduced fraction with a positive denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

impl Ratio {
    /// Build a ratio, reducing it to lowest terms.
    ///
    /// Panics on a zero denominator; every ratio in this crate is a
    /// compile-time constant or the product/quotient of non-zero ones.
    pub const fn new(n: u64, d: u64) -> Self {
        assert!(d != 0, "ratio denominator must be non-zero");
        let g = gcd(n, d);
        Self {
            numerator: n / g,
            denominator: d / g,
        }
    }

    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Interval size in cents (1200 per octave)
    pub fn cents(&self) -> f64 {
        1200.0 * self.to_f64().log2()
    }
}

const fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        if a == 0 {
            1
        } else {
            a
        }
    } else {
        gcd(b, a % b)
    }
}

impl std::ops::Mul for Ratio {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Ratio::new(
            self.numerator * other.numerator,
            self.denominator * other.denominator,
        )
    }
}

impl std::ops::Div for Ratio {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        Ratio::new(
            self.numerator * other.denominator,
            self.denominator * other.numerator,
        )
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}
