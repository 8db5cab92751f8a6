//! Exact non-negative rationals for exchange rates.
//!
//! Rates are compared and applied by cross multiplying in `u128`, so no precision is
//! lost on amounts anywhere in the `u64` range.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub struct Ratio {
    numerator: u64,
    denominator: u64,
}

/// Scale used when converting floating point rates.
const F64_SCALE: u64 = 1_000_000_000;

impl Ratio {
    /// Returns `None` for a zero denominator.
    pub fn new(numerator: u64, denominator: u64) -> Option<Self> {
        (denominator != 0).then_some(Self {
            numerator,
            denominator,
        })
    }

    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let numerator = (value * F64_SCALE as f64).round();
        if numerator > u64::MAX as f64 {
            return None;
        }
        Self::new(numerator as u64, F64_SCALE)
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    /// `floor(amount * self)`, saturating at `u64::MAX`.
    pub fn apply_floor(&self, amount: u64) -> u64 {
        let scaled = amount as u128 * self.numerator as u128 / self.denominator as u128;
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl PartialEq for Ratio {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ratio {}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.numerator as u128 * other.denominator as u128;
        let rhs = other.numerator as u128 * self.denominator as u128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_by_value() {
        let half = Ratio::new(1, 2).unwrap();
        assert_eq!(half, Ratio::new(50, 100).unwrap());
        assert!(half < Ratio::new(2, 3).unwrap());
        assert!(Ratio::new(u64::MAX, 1).unwrap() > Ratio::new(u64::MAX - 1, 1).unwrap());
        assert!(Ratio::new(1, 0).is_none());
    }

    #[test]
    fn applies_with_floor() {
        let rate = Ratio::new(3, 2).unwrap();
        assert_eq!(rate.apply_floor(3), 4);
        assert_eq!(rate.apply_floor(0), 0);
        assert_eq!(Ratio::new(2, 1).unwrap().apply_floor(u64::MAX), u64::MAX);
    }

    #[test]
    fn converts_from_f64() {
        assert_eq!(Ratio::from_f64(0.5).unwrap(), Ratio::new(1, 2).unwrap());
        assert!(Ratio::from_f64(-1.0).is_none());
        assert!(Ratio::from_f64(f64::NAN).is_none());
    }
}
