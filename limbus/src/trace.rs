//! The trace-side boundary of the rewrite: splitting raw trace columns
//! into the limb columns a rewritten schema expects.

use num::BigUint;

use crate::agnostic::limbs::{split_constant, RegisterLimbsMap};
use crate::schema::RegId;

/// Splits a raw column into little-endian limb columns of the given
/// widths: row `r` of column `i` is the `i`-th limb of `values[r]`. Zero
/// rows split to all-zero limbs.
pub fn split_column(values: &[BigUint], widths: &[usize]) -> Vec<Vec<BigUint>> {
    let mut columns = vec![Vec::with_capacity(values.len()); widths.len()];
    for value in values {
        for (column, limb) in columns.iter_mut().zip(split_constant(value, widths)) {
            column.push(limb);
        }
    }
    columns
}

impl RegisterLimbsMap {
    /// Splits the raw column of an original register into its limb
    /// columns, named after the limb registers.
    pub fn split_register_column(
        &self,
        register: RegId,
        values: &[BigUint],
    ) -> Vec<(String, Vec<BigUint>)> {
        let ids = self.limbs_of(register);
        let widths: Vec<usize> = ids.iter().map(|id| self.limb(*id).width).collect();
        ids.iter()
            .zip(split_column(values, &widths))
            .map(|(id, column)| (self.limb(*id).name.clone(), column))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use num::Zero;

    use super::*;
    use crate::schema::{FieldConfig, Module, Register};

    #[test]
    fn test_split_column() {
        let values = vec![
            BigUint::from(0u32),
            BigUint::from(0x1234u32),
            BigUint::from(0xffffu32),
        ];
        let columns = split_column(&values, &[8, 8]);
        assert_eq!(columns.len(), 2);
        assert_eq!(
            columns[0],
            vec![
                BigUint::zero(),
                BigUint::from(0x34u8),
                BigUint::from(0xffu8),
            ],
        );
        assert_eq!(
            columns[1],
            vec![
                BigUint::zero(),
                BigUint::from(0x12u8),
                BigUint::from(0xffu8),
            ],
        );
    }

    #[test]
    fn test_split_recompose_round_trip() {
        use rand::rngs::OsRng;
        use rand::Rng;

        let widths = [8usize, 8, 4];
        for _ in 0..100 {
            let value = BigUint::from(OsRng.gen_range(0u32..1 << 20));
            let columns = split_column(std::slice::from_ref(&value), &widths);
            let mut offset = 0;
            let mut acc = BigUint::zero();
            for (column, &w) in columns.iter().zip(&widths) {
                acc += &column[0] << offset;
                offset += w;
            }
            assert_eq!(acc, value);
        }
    }

    #[test]
    fn test_split_register_column_names() {
        let field = FieldConfig::new("test", 12, 8).unwrap();
        let mut module = Module::new("m");
        let x = module.add_register(Register::input("x", 16));
        let map = crate::agnostic::RegisterLimbsMap::build(&field, &module).unwrap();

        let columns = map.split_register_column(x, &[BigUint::from(0x0102u32)]);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].0, "x'0");
        assert_eq!(columns[1].0, "x'1");
        assert_eq!(columns[0].1, vec![BigUint::from(2u8)]);
        assert_eq!(columns[1].1, vec![BigUint::from(1u8)]);
    }
}
