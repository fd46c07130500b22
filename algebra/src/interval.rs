use num::BigInt;
use serde::{Deserialize, Serialize};

/// A closed interval `[lo, hi]` of unbounded integers.
///
/// Used to bound the possible evaluations of a polynomial whose variables
/// range over known bit-widths. All operations are total.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    lo: BigInt,
    hi: BigInt,
}

impl Interval {
    pub fn new(lo: BigInt, hi: BigInt) -> Self {
        debug_assert!(lo <= hi, "inverted interval [{lo}, {hi}]");
        Self { lo, hi }
    }

    /// The degenerate interval `[v, v]`.
    pub fn point(v: impl Into<BigInt>) -> Self {
        let v = v.into();
        Self {
            lo: v.clone(),
            hi: v,
        }
    }

    /// The range `[0, 2^bits - 1]` of an unsigned value of the given width.
    pub fn unsigned(bits: usize) -> Self {
        Self {
            lo: BigInt::from(0),
            hi: (BigInt::from(1) << bits) - 1,
        }
    }

    pub fn lo(&self) -> &BigInt {
        &self.lo
    }

    pub fn hi(&self) -> &BigInt {
        &self.hi
    }

    pub fn contains(&self, v: &BigInt) -> bool {
        self.lo <= *v && *v <= self.hi
    }

    pub fn add(&self, other: &Self) -> Self {
        Self {
            lo: &self.lo + &other.lo,
            hi: &self.hi + &other.hi,
        }
    }

    /// `[a, b] - [c, d] = [a - d, b - c]`.
    pub fn sub(&self, other: &Self) -> Self {
        Self {
            lo: &self.lo - &other.hi,
            hi: &self.hi - &other.lo,
        }
    }

    pub fn mul(&self, other: &Self) -> Self {
        let corners = [
            &self.lo * &other.lo,
            &self.lo * &other.hi,
            &self.hi * &other.lo,
            &self.hi * &other.hi,
        ];
        Self {
            lo: corners.iter().min().unwrap().clone(),
            hi: corners.iter().max().unwrap().clone(),
        }
    }
}
