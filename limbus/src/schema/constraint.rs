use std::fmt;

use limbus_algebra::poly::Polynomial;
use serde::{Deserialize, Serialize};

use crate::schema::register::RegId;

/// An equality of two polynomials over limbs, holding at every row of a
/// valid trace.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    pub lhs: Polynomial<RegId>,
    pub rhs: Polynomial<RegId>,
}

impl Equation {
    pub fn new(lhs: Polynomial<RegId>, rhs: Polynomial<RegId>) -> Self {
        Self { lhs, rhs }
    }

    /// Moves every negative monomial to the other side, so that neither
    /// side carries a negative coefficient and interval-signedness checks
    /// collapse to unsigned. Idempotent.
    pub fn balance(&self) -> Self {
        let (lhs_pos, lhs_neg) = self.lhs.split_signs();
        let (rhs_pos, rhs_neg) = self.rhs.split_signs();
        Self {
            lhs: lhs_pos.add(&rhs_neg),
            rhs: rhs_pos.add(&lhs_neg),
        }
    }

    pub fn is_balanced(&self) -> bool {
        let no_negatives = |p: &Polynomial<RegId>| p.split_signs().1.is_zero();
        no_negatives(&self.lhs) && no_negatives(&self.rhs)
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.lhs, self.rhs)
    }
}

/// The constraint forms a module can carry.
///
/// The polynomial shapes subdivide under a field config; `Permutation`
/// relates whole columns and has no polynomial reading, so a schema using
/// it cannot be made field-agnostic by limb rewriting.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// `lhs == rhs` at every row.
    Equation { handle: String, eq: Equation },
    /// `expr == 0` at every row.
    Vanishes {
        handle: String,
        expr: Polynomial<RegId>,
    },
    /// The target columns are a row-permutation of the source columns.
    Permutation {
        handle: String,
        sources: Vec<RegId>,
        targets: Vec<RegId>,
    },
}

impl Constraint {
    pub fn handle(&self) -> &str {
        match self {
            Constraint::Equation { handle, .. }
            | Constraint::Vanishes { handle, .. }
            | Constraint::Permutation { handle, .. } => handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(i: usize) -> Polynomial<RegId> {
        Polynomial::var(RegId(i))
    }

    #[test]
    fn test_balance_moves_negatives() {
        // x - y == z - 7  becomes  x + 7 == z + y.
        let eq = Equation::new(
            var(0).sub(&var(1)),
            var(2).add_scalar(-7),
        );
        let balanced = eq.balance();
        assert_eq!(balanced.lhs, var(0).add_scalar(7));
        assert_eq!(balanced.rhs, var(2).add(&var(1)));
        assert!(balanced.is_balanced());
        assert!(!eq.is_balanced());
    }

    #[test]
    fn test_balance_idempotent() {
        let eq = Equation::new(
            var(0).sub(&var(1)).add_scalar(-3),
            var(2).neg(),
        );
        let once = eq.balance();
        assert_eq!(once.balance(), once);
    }

    #[test]
    fn test_balance_preserves_solutions() {
        use num::BigInt;

        let eq = Equation::new(var(0).sub(&var(1)), var(2).add_scalar(-7));
        let balanced = eq.balance();
        for (x, y, z) in [(10, 4, 13), (0, 0, 7), (5, 9, 3)] {
            let env = |v: &RegId| BigInt::from([x, y, z][v.0]);
            let holds = |e: &Equation| e.lhs.eval(&env) == e.rhs.eval(&env);
            assert_eq!(holds(&eq), holds(&balanced));
        }
    }
}
