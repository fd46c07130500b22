use anyhow::{ensure, Result};
use itertools::Itertools;
use limbus_algebra::poly::Polynomial;
use limbus_util::{ceil_div_usize, log2_ceil, previous_power_of_two};
use log::debug;
use num::{BigInt, BigUint, One, Zero};
use serde::{Deserialize, Serialize};

use crate::schema::{FieldConfig, Module, RegId, Register};

/// Number of limbs a register of `width` bits splits into under a register
/// cap of `max_width` bits.
pub fn num_limbs(max_width: usize, width: usize) -> usize {
    ceil_div_usize(width, max_width)
}

/// Limb widths for a register of `width` bits under a cap of `max_width`:
/// a common power-of-two width for every limb except the most significant,
/// which absorbs the remainder. Power-of-two alignment is more
/// constraint-friendly than an arbitrary split.
///
/// The common width is the smallest power of two such that
/// `num_limbs(max_width, width)` limbs suffice, capped at the largest power
/// of two within `max_width`; when the cap bites (`max_width` not a power
/// of two), the limb count grows instead so no limb ever exceeds the cap.
pub fn limb_widths(max_width: usize, width: usize) -> Vec<usize> {
    assert!(max_width > 0);
    if width <= max_width {
        return vec![width];
    }
    let wanted = ceil_div_usize(width, num_limbs(max_width, width));
    let common = (1usize << log2_ceil(wanted)).min(previous_power_of_two(max_width));
    let n = ceil_div_usize(width, common);
    let mut widths = vec![common; n - 1];
    widths.push(width - common * (n - 1));
    widths
}

/// Little-endian limbs of a big integer over the given widths.
pub fn split_constant(value: &BigUint, widths: &[usize]) -> Vec<BigUint> {
    let mut rest = value.clone();
    let limbs = widths
        .iter()
        .map(|&w| {
            let mask = (BigUint::one() << w) - 1u8;
            let limb = &rest & &mask;
            rest >>= w;
            limb
        })
        .collect();
    debug_assert!(rest.is_zero(), "value {value} wider than {widths:?}");
    limbs
}

/// Splits a register into limbs of width at most `max_width`, least
/// significant first. Limb `i` is named `"{name}'{i}"`; the kind is
/// preserved and the padding value is split along with the register. A
/// register already within the cap is returned unchanged.
pub fn split_register(max_width: usize, reg: &Register) -> Vec<Register> {
    if reg.width <= max_width {
        return vec![reg.clone()];
    }
    let widths = limb_widths(max_width, reg.width);
    let values = split_constant(&reg.padding, &widths);
    widths
        .iter()
        .zip_eq(values)
        .enumerate()
        .map(|(i, (&width, padding))| Register {
            kind: reg.kind,
            name: format!("{}'{i}", reg.name),
            width,
            padding,
        })
        .collect()
}

/// The polynomial `sum_i 2^(offset_i) * regs[i]` composing limbs back into
/// the value they decompose.
pub fn compose(regs: &[RegId], widths: &[usize]) -> Polynomial<RegId> {
    let mut offset = 0;
    let mut acc = Polynomial::zero();
    for (&reg, &width) in regs.iter().zip_eq(widths) {
        acc = acc.add(&Polynomial::monomial(BigInt::one() << offset, vec![reg]));
        offset += width;
    }
    acc
}

/// Per-module mapping from original registers to their limbs in the split
/// register space. Original register IDs index `groups`; the IDs inside
/// each group index `limbs`, the register list of the rewritten module
/// before any carries are allocated.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RegisterLimbsMap {
    limbs: Vec<Register>,
    groups: Vec<Vec<RegId>>,
}

impl RegisterLimbsMap {
    pub fn build(field: &FieldConfig, module: &Module) -> Result<Self> {
        let mut limbs = Vec::new();
        let mut groups = Vec::with_capacity(module.registers.len());
        for reg in &module.registers {
            ensure!(
                reg.width > 0 || reg.padding.is_zero(),
                "module `{}`: register `{}` has width 0 but padding {}",
                module.name,
                reg.name,
                reg.padding,
            );
            let split = split_register(field.register_width, reg);
            groups.push((limbs.len()..limbs.len() + split.len()).map(RegId).collect());
            limbs.extend(split);
        }
        debug!(
            "module `{}`: {} registers split into {} limbs of width <= {}",
            module.name,
            module.registers.len(),
            limbs.len(),
            field.register_width,
        );
        Ok(Self { limbs, groups })
    }

    pub fn limbs(&self) -> &[Register] {
        &self.limbs
    }

    pub fn limb(&self, id: RegId) -> &Register {
        &self.limbs[id.0]
    }

    /// The limb IDs of an original register, least significant first.
    pub fn limbs_of(&self, original: RegId) -> &[RegId] {
        &self.groups[original.0]
    }

    /// The original register's value as a polynomial over its limbs.
    pub fn decomposition(&self, original: RegId) -> Polynomial<RegId> {
        let ids = self.limbs_of(original);
        let widths = ids.iter().map(|id| self.limb(*id).width).collect_vec();
        compose(ids, &widths)
    }

    /// Rewrites a polynomial over original registers into one over limbs.
    /// All variables are replaced simultaneously; the two ID spaces are
    /// unrelated.
    pub fn substitute(&self, p: &Polynomial<RegId>) -> Polynomial<RegId> {
        p.substitute_all(|v| self.decomposition(*v))
    }
}

/// The full split map of a schema under a field config: one
/// [`RegisterLimbsMap`] per module, in schema order. Downstream tooling
/// uses it to split concrete trace columns.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LimbMap {
    pub field: FieldConfig,
    pub modules: Vec<RegisterLimbsMap>,
}
