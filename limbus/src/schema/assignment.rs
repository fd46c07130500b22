use std::fmt;

use itertools::Itertools;
use limbus_algebra::poly::Polynomial;
use serde::{Deserialize, Serialize};

use crate::schema::register::RegId;

/// A rule fixing the values of one or more computed limbs from a
/// polynomial over other limbs.
///
/// The targets are the little-endian decomposition of one wide value: with
/// `offset_i` the sum of the widths of the preceding targets, the composite
/// integer `sum_i 2^(offset_i) * t_i` equals `value(expr) >> shift`. A
/// negative value is represented two's-complement over the composite
/// width.
///
/// Source schemas use `shift = 0`; the rewrite emits carry-fill rules with
/// `shift > 0` ("this register holds the bits of `expr` above `shift`").
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub targets: Vec<RegId>,
    pub shift: usize,
    pub expr: Polynomial<RegId>,
}

impl Assignment {
    pub fn new(targets: Vec<RegId>, expr: Polynomial<RegId>) -> Self {
        Self {
            targets,
            shift: 0,
            expr,
        }
    }

    /// A carry-fill rule: `target := expr >> shift`.
    pub fn shifted(target: RegId, shift: usize, expr: Polynomial<RegId>) -> Self {
        Self {
            targets: vec![target],
            shift,
            expr,
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] := {}", self.targets.iter().join(", "), self.expr)?;
        if self.shift > 0 {
            write!(f, " >> {}", self.shift)?;
        }
        Ok(())
    }
}
