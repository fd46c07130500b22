use std::fmt;

use num::BigUint;
use serde::{Deserialize, Serialize};

/// Identifies a register within its module.
///
/// Indices are dense: the original registers of a module come first, and
/// registers created during a rewrite (limbs, carries, sign bits) extend
/// the list. IDs from the pre-rewrite module and the rewritten module are
/// distinct spaces; the limb map translates between them.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize,
)]
pub struct RegId(pub usize);

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum RegisterKind {
    /// Provided by the caller of the constraint system.
    Input,
    /// Exposed back to the caller.
    Output,
    /// Filled by an assignment during trace expansion.
    Computed,
    /// The constant 0, width 0.
    ConstZero,
    /// The constant 1, width 1.
    ConstOne,
}

impl RegisterKind {
    pub const fn is_const(&self) -> bool {
        matches!(self, RegisterKind::ConstZero | RegisterKind::ConstOne)
    }
}

/// A named storage cell of declared bit-width; the analogue of a column in
/// the final trace. A register produced by subdividing a wider one is
/// called a limb, but has the same shape.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Register {
    pub kind: RegisterKind,
    pub name: String,
    pub width: usize,
    /// The value used to pad this register's trace column. For const
    /// registers this always equals the constant.
    pub padding: BigUint,
}

impl Register {
    pub fn input(name: impl Into<String>, width: usize) -> Self {
        Self {
            kind: RegisterKind::Input,
            name: name.into(),
            width,
            padding: BigUint::from(0u8),
        }
    }

    pub fn output(name: impl Into<String>, width: usize) -> Self {
        Self {
            kind: RegisterKind::Output,
            name: name.into(),
            width,
            padding: BigUint::from(0u8),
        }
    }

    pub fn computed(name: impl Into<String>, width: usize) -> Self {
        Self {
            kind: RegisterKind::Computed,
            name: name.into(),
            width,
            padding: BigUint::from(0u8),
        }
    }

    pub fn const_zero() -> Self {
        Self {
            kind: RegisterKind::ConstZero,
            name: "0".into(),
            width: 0,
            padding: BigUint::from(0u8),
        }
    }

    pub fn const_one() -> Self {
        Self {
            kind: RegisterKind::ConstOne,
            name: "1".into(),
            width: 1,
            padding: BigUint::from(1u8),
        }
    }

    pub fn with_padding(mut self, padding: impl Into<BigUint>) -> Self {
        self.padding = padding.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_registers() {
        let zero = Register::const_zero();
        assert_eq!(zero.width, 0);
        assert_eq!(zero.padding, BigUint::from(0u8));
        assert!(zero.kind.is_const());

        let one = Register::const_one();
        assert_eq!(one.width, 1);
        assert_eq!(one.padding, BigUint::from(1u8));
        assert!(one.kind.is_const());

        assert!(!Register::input("x", 8).kind.is_const());
    }
}
