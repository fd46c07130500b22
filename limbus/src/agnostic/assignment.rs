use std::collections::BTreeSet;

use anyhow::{bail, ensure, Result};
use hashbrown::HashMap;
use itertools::Itertools;
use limbus_algebra::poly::Polynomial;
use limbus_util::ceil_div_usize;
use log::trace;
use num::{BigInt, One};

use crate::agnostic::allocator::RegisterAllocator;
use crate::agnostic::equation::CARRY;
use crate::agnostic::limbs::{compose, limb_widths};
use crate::schema::{Assignment, FieldConfig, RegId};

/// Name prefix of sign/borrow bits allocated during chunking.
pub(crate) const SIGN: &str = "sign";

/// A contiguous run of target limbs forming one slot of the composite.
#[derive(Clone, Debug)]
struct LhsChunk {
    width: usize,
    regs: Vec<RegId>,
}

/// Tracks how finely each register of the right-hand side must be
/// subdivided to shrink non-linear term widths, and which register each
/// sub-limb came from. A sub-limb marked for further subdivision is
/// normalized back to its ultimate parent, whose division factor then
/// doubles.
struct RegisterSplitter {
    factors: HashMap<RegId, usize>,
    parents: HashMap<RegId, RegId>,
}

impl RegisterSplitter {
    fn new() -> Self {
        Self {
            factors: HashMap::new(),
            parents: HashMap::new(),
        }
    }

    fn parent_of(&self, mut v: RegId) -> RegId {
        while let Some(&p) = self.parents.get(&v) {
            v = p;
        }
        v
    }

    /// Doubles the division factor of `v`. Returns false once the factor
    /// has reached the register's width, where sub-limbs are single bits
    /// and no further subdivision is possible.
    fn double(&mut self, v: RegId, width: usize) -> bool {
        let factor = self.factors.entry(v).or_insert(1);
        if *factor >= width {
            return false;
        }
        *factor *= 2;
        true
    }

    /// Substitutes every variable with a division factor above 1 by a sum
    /// of fresh sub-limbs, recording the assignment that fixes the
    /// decomposition (`sub-limbs := v`).
    fn apply(
        &mut self,
        expr: &Polynomial<RegId>,
        alloc: &mut RegisterAllocator,
        aux: &mut Vec<Assignment>,
    ) -> Polynomial<RegId> {
        let mut result = expr.clone();
        for v in expr.vars() {
            let factor = self.factors.get(&v).copied().unwrap_or(1);
            if factor == 1 {
                continue;
            }
            let width = alloc.width(v);
            let widths = limb_widths(ceil_div_usize(width, factor), width);
            let name = alloc.register(v).name.clone();
            let sub_limbs = widths
                .iter()
                .enumerate()
                .map(|(i, &w)| alloc.allocate_named(format!("{name}'{i}"), w))
                .collect_vec();
            for &s in &sub_limbs {
                self.parents.insert(s, v);
            }
            aux.push(Assignment::new(sub_limbs.clone(), Polynomial::var(v)));
            result = result.substitute(&v, &compose(&sub_limbs, &widths));
        }
        result
    }
}

enum Outcome {
    Done(Vec<Assignment>),
    /// Registers appearing in some over-bandwidth chunk, candidates for
    /// further subdivision.
    Overflow(BTreeSet<RegId>),
}

/// Splits an assignment whose composite target is a sequence of limbs into
/// assignments that each evaluate within the field bandwidth.
///
/// The target limbs are grouped greedily into slots of at most `W + 1`
/// bits (one bit over the register width, headroom for the sign a
/// chunk-wise subtraction can introduce), and the right-hand side is
/// propagated across the slots least-significant first, splitting off a
/// carry register wherever a slot's value spills over and a sign bit once
/// signed arithmetic has begun. When a slot's polynomial cannot fit the
/// bandwidth at all, the registers feeding it are subdivided and the
/// whole propagation restarts.
pub fn subdivide_assignment(
    targets: &[RegId],
    expr: &Polynomial<RegId>,
    field: &FieldConfig,
    alloc: &mut RegisterAllocator,
) -> Result<Vec<Assignment>> {
    ensure!(!targets.is_empty(), "assignment with no targets");
    let composite: usize = targets.iter().map(|t| alloc.width(*t)).sum();
    let hi = expr.interval(&alloc.widths()).hi().clone();
    ensure!(
        hi < BigInt::one() << composite,
        "`{}`: upper bound {hi} exceeds the {composite}-bit target range",
        Assignment::new(targets.to_vec(), expr.clone()),
    );
    if alloc.poly_width(expr).bits <= field.bandwidth && composite <= field.bandwidth {
        return Ok(vec![Assignment::new(targets.to_vec(), expr.clone())]);
    }

    let mut splitter = RegisterSplitter::new();
    let mut previous: Option<Polynomial<RegId>> = None;
    loop {
        let checkpoint = alloc.checkpoint();
        let mut aux = Vec::new();
        let rhs = splitter.apply(expr, alloc, &mut aux);
        if previous.as_ref() == Some(&rhs) {
            bail!(
                "assignment chunking stalled on `{rhs}` (division factors {:?})",
                splitter.factors,
            );
        }
        let chunks = partition_targets(targets, field.register_width + 1, alloc);
        match propagate(&chunks, &rhs, field, alloc) {
            Outcome::Done(done) => {
                aux.extend(done);
                return Ok(aux);
            }
            Outcome::Overflow(overwide) => {
                let mut progressed = false;
                for v in &overwide {
                    let parent = splitter.parent_of(*v);
                    let width = alloc.width(parent);
                    progressed |= splitter.double(parent, width);
                }
                ensure!(
                    progressed,
                    "cannot subdivide {overwide:?} of `{rhs}` any further \
                     (division factors {:?})",
                    splitter.factors,
                );
                trace!(
                    "chunk over bandwidth, subdividing {} registers further",
                    overwide.len(),
                );
                alloc.reset(checkpoint);
                previous = Some(rhs);
            }
        }
    }
}

/// Groups consecutive target limbs greedily, least significant first,
/// while the running width stays within `max`.
fn partition_targets(
    targets: &[RegId],
    max: usize,
    alloc: &RegisterAllocator,
) -> Vec<LhsChunk> {
    let mut chunks = Vec::new();
    let mut regs: Vec<RegId> = Vec::new();
    let mut width = 0;
    for &t in targets {
        let w = alloc.width(t);
        if width > 0 && width + w > max {
            chunks.push(LhsChunk {
                width,
                regs: std::mem::take(&mut regs),
            });
            width = 0;
        }
        regs.push(t);
        width += w;
    }
    chunks.push(LhsChunk { width, regs });
    chunks
}

/// Propagates the right-hand side across the target slots, LSB first.
fn propagate(
    chunks: &[LhsChunk],
    rhs: &Polynomial<RegId>,
    field: &FieldConfig,
    alloc: &mut RegisterAllocator,
) -> Outcome {
    let mut rem = rhs.clone();
    let mut overflow = BTreeSet::new();
    let mut out = Vec::with_capacity(chunks.len());
    let mut signed_seen = false;

    for (i, chunk) in chunks.iter().enumerate() {
        let last = i + 1 == chunks.len();
        let (mut carry_out, chunk_rhs) = rem.shr(chunk.width);
        let width = alloc.poly_width(&chunk_rhs);
        if width.bits > field.bandwidth {
            overflow.extend(chunk_rhs.vars());
        }

        let mut regs = chunk.regs.clone();
        // Offset of the next auxiliary bit above the slot's own limbs.
        let mut top = chunk.width;
        if !last && width.bits > chunk.width {
            let carry = alloc.allocate(CARRY, width.bits - chunk.width);
            regs.push(carry);
            carry_out = carry_out.add(&Polynomial::var(carry));
            top = width.bits;
        }
        signed_seen |= width.signed;
        if signed_seen && !last {
            // The slot's value may run negative; its two's-complement top
            // bit is exposed as a borrow and repaid by the next slot.
            let sign = alloc.allocate(SIGN, 1);
            regs.push(sign);
            let repay =
                Polynomial::monomial(BigInt::one() << (top - chunk.width), vec![sign]);
            carry_out = carry_out.sub(&repay);
        }
        out.push(Assignment::new(regs, chunk_rhs));
        rem = carry_out;
    }

    if overflow.is_empty() {
        Outcome::Done(out)
    } else {
        Outcome::Overflow(overflow)
    }
}
