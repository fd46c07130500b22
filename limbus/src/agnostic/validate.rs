//! Post-rewrite consistency checks. Unlike the rewrite itself, these
//! collect diagnostics instead of failing fast, so callers can report
//! every problem at once.

use crate::agnostic::limbs::LimbMap;
use crate::schema::{Constraint, RegId, Schema};

/// Checks a rewritten schema against the original and the limb map.
/// Returns one message per violated invariant; an empty list means the
/// rewrite is consistent.
pub fn validate_subdivision(
    original: &Schema,
    rewritten: &Schema,
    map: &LimbMap,
) -> Vec<String> {
    let mut issues = Vec::new();
    let field = &map.field;
    if original.modules.len() != rewritten.modules.len()
        || rewritten.modules.len() != map.modules.len()
    {
        issues.push(format!(
            "module count mismatch: {} original, {} rewritten, {} mapped",
            original.modules.len(),
            rewritten.modules.len(),
            map.modules.len(),
        ));
        return issues;
    }

    for ((original, rewritten), limbs) in original
        .modules
        .iter()
        .zip(&rewritten.modules)
        .zip(&map.modules)
    {
        let m = &rewritten.name;

        for reg in &rewritten.registers {
            if reg.width > field.register_width && !reg.kind.is_const() {
                issues.push(format!(
                    "module `{m}`: register `{}` is {} bits wide, over the {}-bit cap",
                    reg.name, reg.width, field.register_width,
                ));
            }
        }

        // Each original register must survive as its ordered limb group:
        // widths summing to the original, kind preserved, every limb
        // still present in the rewritten register list.
        for (id, reg) in original.registers.iter().enumerate() {
            let group = limbs.limbs_of(RegId(id));
            let total: usize = group.iter().map(|l| limbs.limb(*l).width).sum();
            if total != reg.width {
                issues.push(format!(
                    "module `{m}`: limbs of `{}` cover {total} bits of {}",
                    reg.name, reg.width,
                ));
            }
            if reg.kind.is_const() && group.len() != 1 {
                issues.push(format!(
                    "module `{m}`: const register `{}` was split",
                    reg.name,
                ));
            }
            for limb in group {
                let expected = limbs.limb(*limb);
                if expected.kind != reg.kind {
                    issues.push(format!(
                        "module `{m}`: limb `{}` changed kind", expected.name,
                    ));
                }
                if rewritten.registers.get(limb.0) != Some(expected) {
                    issues.push(format!(
                        "module `{m}`: limb `{}` of `{}` is missing from the rewrite",
                        expected.name, reg.name,
                    ));
                }
            }
        }

        let widths = rewritten.widths();
        for constraint in &rewritten.constraints {
            match constraint {
                Constraint::Equation { handle, eq } => {
                    for (side, poly) in [("lhs", &eq.lhs), ("rhs", &eq.rhs)] {
                        let bits = poly.value_width(&widths).bits;
                        if bits > field.bandwidth {
                            issues.push(format!(
                                "module `{m}`: constraint `{handle}` {side} needs {bits} bits, \
                                 over the {}-bit bandwidth",
                                field.bandwidth,
                            ));
                        }
                    }
                }
                Constraint::Vanishes { handle, expr } => {
                    let bits = expr.value_width(&widths).bits;
                    if bits > field.bandwidth {
                        issues.push(format!(
                            "module `{m}`: constraint `{handle}` needs {bits} bits, \
                             over the {}-bit bandwidth",
                            field.bandwidth,
                        ));
                    }
                }
                Constraint::Permutation { handle, .. } => {
                    issues.push(format!(
                        "module `{m}`: constraint `{handle}` survived the rewrite \
                         without a polynomial form",
                    ));
                }
            }
        }

        for assignment in &rewritten.assignments {
            let bits = assignment.expr.value_width(&widths).bits;
            if bits > field.bandwidth {
                issues.push(format!(
                    "module `{m}`: assignment `{assignment}` needs {bits} bits, \
                     over the {}-bit bandwidth",
                    field.bandwidth,
                ));
            }
        }
    }
    issues
}
