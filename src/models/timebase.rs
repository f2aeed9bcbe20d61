//! Rational time in quarter-note units
//!
//! All offsets and durations in the document model are exact rationals
//! with the quarter note as 1. Triplets and other tuplets therefore stay
//! exact (an eighth-note triplet member is 1/3) and ordering two offsets
//! never depends on floating-point rounding.

use num_rational::Ratio;

/// Time in quarter notes. Offset 0 is the start of the enclosing stream.
pub type Quarters = Ratio<i64>;

/// A whole number of quarter notes.
pub fn quarters(n: i64) -> Quarters {
    Ratio::from_integer(n)
}

/// A fractional quarter-note value, e.g. `frac(1, 3)` for one triplet
/// eighth. Panics if `den` is zero.
pub fn frac(num: i64, den: i64) -> Quarters {
    Ratio::new(num, den)
}

/// The zero offset / zero duration.
pub fn zero() -> Quarters {
    Ratio::from_integer(0)
}
