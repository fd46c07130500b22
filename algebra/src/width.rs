use std::cmp::max;

use num::bigint::Sign;
use num::BigInt;
use serde::{Deserialize, Serialize};

use crate::interval::Interval;
use crate::poly::Polynomial;

/// The minimum number of bits needed to hold every value of some quantity,
/// including a sign bit when `signed` is set. A signed `bits`-wide value
/// ranges over `[-2^(bits-1), 2^(bits-1) - 1]`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValueWidth {
    pub bits: usize,
    pub signed: bool,
}

/// Bit-length of the magnitude of `x`, adjusted for the asymmetry of the
/// two's-complement range: for negative `x` this is `bitlen(|x| - 1)`, so
/// that `-2^(b-1)` still fits in `b - 1` magnitude bits.
fn magnitude_bits(x: &BigInt) -> usize {
    match x.sign() {
        Sign::Minus => ((-x) - 1u8).bits() as usize,
        _ => x.bits() as usize,
    }
}

/// The width of any value drawn from the interval. The `+1` for the sign
/// bit is applied here, not in the interval primitives.
pub fn interval_width(iv: &Interval) -> ValueWidth {
    if iv.lo().sign() != Sign::Minus {
        ValueWidth {
            bits: iv.hi().bits() as usize,
            signed: false,
        }
    } else {
        ValueWidth {
            bits: 1 + max(magnitude_bits(iv.hi()), magnitude_bits(iv.lo())),
            signed: true,
        }
    }
}

impl<V: Clone + Ord> Polynomial<V> {
    /// The tight interval of evaluations with each variable ranging over
    /// `[0, 2^widths(v) - 1]`, composed term by term.
    pub fn interval(&self, widths: &impl Fn(&V) -> usize) -> Interval {
        self.terms()
            .iter()
            .map(|t| {
                t.vars().iter().fold(
                    Interval::point(t.coeff().clone()),
                    |acc, v| acc.mul(&Interval::unsigned(widths(v))),
                )
            })
            .fold(Interval::point(0), |acc, iv| acc.add(&iv))
    }

    /// The `(bits, signed)` width of this polynomial's evaluations under
    /// the given variable widths. The empty polynomial has width
    /// `(0, unsigned)`.
    pub fn value_width(&self, widths: &impl Fn(&V) -> usize) -> ValueWidth {
        interval_width(&self.interval(widths))
    }
}
