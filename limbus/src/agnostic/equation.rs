use std::cmp::max;

use anyhow::{bail, Result};
use itertools::Itertools;
use limbus_algebra::interval::Interval;
use limbus_algebra::poly::{Monomial, Polynomial};
use limbus_algebra::width::interval_width;
use limbus_util::ceil_div_usize;
use log::trace;
use num::BigInt;
use num::One;

use crate::agnostic::allocator::RegisterAllocator;
use crate::agnostic::limbs::{compose, limb_widths};
use crate::schema::{Equation, FieldConfig, RegId};

/// Name prefix of carry registers allocated during chunking.
pub(crate) const CARRY: &str = "carry";

/// Splits an equation over limbs into a list of equations that each
/// evaluate within the field bandwidth, equivalent to the input on every
/// trace that respects the carry fills queued in the allocator.
///
/// The equation is balanced first, so both sides have only nonnegative
/// coefficients. Chunking starts at the register width and halves the
/// chunk width whenever some chunk still exceeds the bandwidth; before
/// each attempt, variables of over-bandwidth non-linear terms are
/// subdivided into narrower sub-limbs, tied to the original by auxiliary
/// decomposition equations.
pub fn subdivide_equation(
    equation: &Equation,
    field: &FieldConfig,
    alloc: &mut RegisterAllocator,
) -> Result<Vec<Equation>> {
    let equation = equation.balance();
    let bandwidth = field.bandwidth;
    if alloc.poly_width(&equation.lhs).bits <= bandwidth
        && alloc.poly_width(&equation.rhs).bits <= bandwidth
    {
        return Ok(vec![equation]);
    }

    let mut chunk_width = field.register_width;
    while chunk_width > 0 {
        let checkpoint = alloc.checkpoint();
        let mut aux = Vec::new();
        let mut lhs = equation.lhs.clone();
        let mut rhs = equation.rhs.clone();
        split_wide_monomials(&mut lhs, chunk_width, field, alloc, &mut aux);
        split_wide_monomials(&mut rhs, chunk_width, field, alloc, &mut aux);
        if let Some(chunks) = chunk_sides(&lhs, &rhs, chunk_width, field, alloc) {
            aux.extend(chunks);
            return Ok(aux);
        }
        alloc.reset(checkpoint);
        trace!("chunk width {chunk_width} too coarse for `{equation}`, halving");
        chunk_width /= 2;
    }
    bail!("`{equation}` exceeds the {bandwidth}-bit bandwidth even at single-bit chunks");
}

/// The width of a monomial's evaluations with the power-of-two factor of
/// its coefficient stripped. That factor only positions the monomial
/// within the bit range, and the layered chunking absorbs it; what must
/// fit the bandwidth is the remaining payload.
fn payload_width(term: &Monomial<RegId>, alloc: &RegisterAllocator) -> usize {
    let shift = term.coeff().trailing_zeros().unwrap_or(0) as usize;
    let odd = term.coeff() >> shift;
    let interval = term
        .vars()
        .iter()
        .fold(Interval::point(odd), |acc, v| {
            acc.mul(&Interval::unsigned(alloc.width(*v)))
        });
    interval_width(&interval).bits
}

/// While some monomial's payload exceeds the bandwidth, subdivides its
/// lowest-ID variable wider than the chunk width into sub-limbs, emitting
/// an auxiliary equation `v == sum_i 2^(offset_i) * v'i` and substituting
/// the sum for `v` throughout. Stops when every monomial fits or no
/// variable is left to subdivide (the caller then falls back to a finer
/// chunk width).
fn split_wide_monomials(
    poly: &mut Polynomial<RegId>,
    chunk_width: usize,
    field: &FieldConfig,
    alloc: &mut RegisterAllocator,
    aux: &mut Vec<Equation>,
) {
    loop {
        let victim = poly.terms().iter().find_map(|term| {
            if payload_width(term, alloc) > field.bandwidth {
                term.vars()
                    .iter()
                    .find(|v| alloc.width(**v) > chunk_width)
                    .copied()
            } else {
                None
            }
        });
        let Some(v) = victim else { return };

        let widths = limb_widths(chunk_width, alloc.width(v));
        let name = alloc.register(v).name.clone();
        let sub_limbs = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| alloc.allocate_named(format!("{name}'{i}"), w))
            .collect_vec();
        let decomposition = compose(&sub_limbs, &widths);
        trace!("subdividing {name} into {} sub-limbs", sub_limbs.len());
        aux.push(Equation::new(Polynomial::var(v), decomposition.clone()));
        *poly = poly.substitute(&v, &decomposition);
    }
}

/// Partitions both sides into chunks of the given width by repeated
/// coefficient division, then inserts carries least-significant first.
/// Returns `None` when some chunk cannot be brought within the bandwidth
/// at this chunk width.
fn chunk_sides(
    lhs: &Polynomial<RegId>,
    rhs: &Polynomial<RegId>,
    chunk_width: usize,
    field: &FieldConfig,
    alloc: &mut RegisterAllocator,
) -> Option<Vec<Equation>> {
    let bandwidth = field.bandwidth;
    let total = max(
        alloc.poly_width(lhs).bits,
        alloc.poly_width(rhs).bits,
    );
    let n = ceil_div_usize(total, chunk_width);
    let mut sides = [
        partition(lhs, chunk_width, n),
        partition(rhs, chunk_width, n),
    ];

    for i in 0..n {
        // A chunk is final once nothing remains above it on either side;
        // a carry there would only force an empty tail equation.
        let is_last = (i + 1..n).all(|j| sides[0][j].is_zero() && sides[1][j].is_zero());
        for side in &mut sides {
            let width = alloc.poly_width(&side[i]);
            if width.bits > bandwidth {
                return None;
            }
            if !is_last && width.bits > chunk_width {
                let carry = alloc.allocate(CARRY, width.bits - chunk_width);
                alloc.assign(carry, chunk_width, side[i].clone());
                let outgoing =
                    Polynomial::monomial(BigInt::one() << chunk_width, vec![carry]);
                side[i] = side[i].sub(&outgoing);
                side[i + 1] = side[i + 1].add(&Polynomial::var(carry));
                if alloc.poly_width(&side[i]).bits > bandwidth {
                    return None;
                }
            }
        }
    }

    let [lhs_chunks, rhs_chunks] = sides;
    Some(
        lhs_chunks
            .into_iter()
            .zip_eq(rhs_chunks)
            .filter(|(l, r)| !(l.is_zero() && r.is_zero()))
            .map(|(l, r)| Equation::new(l, r))
            .collect(),
    )
}

/// The chunks of `p` in successive `chunk_width`-bit slots, least
/// significant first; the last chunk absorbs whatever remains.
fn partition(p: &Polynomial<RegId>, chunk_width: usize, n: usize) -> Vec<Polynomial<RegId>> {
    let mut chunks = Vec::with_capacity(n);
    let mut rest = p.clone();
    for _ in 0..n - 1 {
        let (quotient, remainder) = rest.shr(chunk_width);
        chunks.push(remainder);
        rest = quotient;
    }
    chunks.push(rest);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Register;

    fn var(i: usize) -> Polynomial<RegId> {
        Polynomial::var(RegId(i))
    }

    fn scaled(c: i64, i: usize) -> Polynomial<RegId> {
        Polynomial::monomial(c, vec![RegId(i)])
    }

    #[test]
    fn test_fitting_equation_passes_through() {
        let field = FieldConfig::new("test", 12, 8).unwrap();
        let mut alloc = RegisterAllocator::new(vec![
            Register::input("x", 8),
            Register::input("y", 8),
        ]);
        let eq = Equation::new(var(0), var(1).add_scalar(1));
        let out = subdivide_equation(&eq, &field, &mut alloc).unwrap();
        assert_eq!(out, vec![eq]);
        assert_eq!(alloc.len(), 2);
        assert!(alloc.assignments().is_empty());
    }

    #[test]
    fn test_sixteen_bit_equality_splits_with_one_carry() {
        // x == y + 1 over 16-bit values already in 8-bit limbs, with a
        // 12-bit bandwidth.
        let field = FieldConfig::new("test", 12, 8).unwrap();
        let mut alloc = RegisterAllocator::new(vec![
            Register::input("x'0", 8),
            Register::input("x'1", 8),
            Register::input("y'0", 8),
            Register::input("y'1", 8),
        ]);
        let eq = Equation::new(
            var(0).add(&scaled(256, 1)),
            var(2).add(&scaled(256, 3)).add_scalar(1),
        );
        let out = subdivide_equation(&eq, &field, &mut alloc).unwrap();

        // x'0 == y'0 + 1 - 256*c  and  x'1 == y'1 + c.
        let c = RegId(4);
        assert_eq!(alloc.len(), 5);
        assert_eq!(alloc.register(c).name, "carry$0");
        assert_eq!(alloc.width(c), 1);
        assert_eq!(
            out,
            vec![
                Equation::new(
                    var(0),
                    var(2).add_scalar(1).sub(&scaled(256, 4)),
                ),
                Equation::new(var(1), var(3).add(&var(4))),
            ],
        );

        // The carry is filled from the low chunk of the right-hand side.
        let fills = alloc.assignments();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].reg, c);
        assert_eq!(fills[0].shift, 8);
        assert_eq!(fills[0].expr, var(2).add_scalar(1));

        // Every emitted equation fits the bandwidth.
        let widths = |v: &RegId| [8, 8, 8, 8, 1][v.0];
        for eq in &out {
            assert!(eq.lhs.value_width(&widths).bits <= 12);
            assert!(eq.rhs.value_width(&widths).bits <= 12);
        }
    }

    #[test]
    fn test_nonlinear_product_subdivides_a_variable() {
        // 0 == x * y over u8 inputs with a 15-bit bandwidth: the 16-bit
        // product forces x into two 4-bit sub-limbs.
        let field = FieldConfig::new("test", 15, 8).unwrap();
        let mut alloc = RegisterAllocator::new(vec![
            Register::input("x", 8),
            Register::input("y", 8),
        ]);
        let eq = Equation::new(Polynomial::zero(), var(0).mul(&var(1)));
        let out = subdivide_equation(&eq, &field, &mut alloc).unwrap();

        // x'0, x'1 and one carry were allocated.
        assert_eq!(alloc.len(), 5);
        assert_eq!(alloc.register(RegId(2)).name, "x'0");
        assert_eq!(alloc.register(RegId(3)).name, "x'1");
        assert_eq!(alloc.width(RegId(2)), 4);
        assert_eq!(alloc.width(RegId(3)), 4);
        let carry = RegId(4);
        assert_eq!(alloc.register(carry).name, "carry$0");

        // Auxiliary decomposition first: x == x'0 + 16*x'1.
        assert_eq!(
            out[0],
            Equation::new(var(0), var(2).add(&scaled(16, 3))),
        );
        // Then the chunks: 0 == x'0*y - 16*carry and 0 == x'1*y + carry.
        assert_eq!(
            out[1],
            Equation::new(
                Polynomial::zero(),
                var(2).mul(&var(1)).sub(&scaled(16, 4)),
            ),
        );
        assert_eq!(
            out[2],
            Equation::new(
                Polynomial::zero(),
                var(3).mul(&var(1)).add(&var(4)),
            ),
        );
        assert_eq!(out.len(), 3);

        let widths = |v: &RegId| [8, 8, 4, 4, 8][v.0];
        for eq in &out {
            assert!(eq.rhs.value_width(&widths).bits <= 15);
        }
    }

    #[test]
    fn test_nonlinear_split_preserves_semantics() {
        use num::BigInt;

        let field = FieldConfig::new("test", 15, 8).unwrap();
        let mut alloc = RegisterAllocator::new(vec![
            Register::input("x", 8),
            Register::input("y", 8),
        ]);
        let eq = Equation::new(Polynomial::zero(), var(0).mul(&var(1)));
        let out = subdivide_equation(&eq, &field, &mut alloc).unwrap();
        let fills = alloc.assignments();
        assert_eq!(fills.len(), 1);

        // With sub-limbs and the carry filled per their defining rules,
        // the split equations hold exactly when x * y == 0 does.
        for (x, y, satisfied) in
            [(0u32, 17u32, true), (23, 0, true), (16, 9, false), (3, 5, false)]
        {
            let mut values = vec![
                BigInt::from(x),
                BigInt::from(y),
                BigInt::from(x % 16),
                BigInt::from(x / 16),
                BigInt::from(0),
            ];
            values[fills[0].reg.0] =
                fills[0].expr.eval(|v| values[v.0].clone()) >> fills[0].shift;
            let holds = out.iter().all(|eq| {
                eq.lhs.eval(|v| values[v.0].clone()) == eq.rhs.eval(|v| values[v.0].clone())
            });
            assert_eq!(holds, satisfied, "x={x} y={y}");
        }
    }

    #[test]
    fn test_unbalanced_input_is_balanced_first() {
        let field = FieldConfig::new("test", 12, 8).unwrap();
        let mut alloc = RegisterAllocator::new(vec![
            Register::input("x", 8),
            Register::input("y", 8),
        ]);
        // x - y == 0 fits once balanced to x == y.
        let eq = Equation::new(var(0).sub(&var(1)), Polynomial::zero());
        let out = subdivide_equation(&eq, &field, &mut alloc).unwrap();
        assert_eq!(out, vec![Equation::new(var(0), var(1))]);
    }
}
