//! The field-agnosticity subsystem: rewrites a schema so that every
//! register fits the field's register-width cap and every polynomial
//! evaluation fits its bandwidth, preserving the constraint semantics.

pub mod allocator;
pub mod assignment;
pub mod equation;
pub mod limbs;
pub mod validate;

use anyhow::{bail, ensure, Context, Result};
use itertools::Itertools;
use limbus_algebra::poly::Polynomial;
use log::debug;

pub use crate::agnostic::allocator::RegisterAllocator;
pub use crate::agnostic::assignment::subdivide_assignment;
pub use crate::agnostic::equation::subdivide_equation;
pub use crate::agnostic::limbs::{LimbMap, RegisterLimbsMap};
use crate::schema::{
    Assignment, Constraint, Equation, FieldConfig, Module, Schema,
};

/// The per-module rewrite hook: produce an equivalent module whose
/// registers and polynomial evaluations fit the field config.
pub trait Subdivide {
    fn subdivide(&self, field: &FieldConfig, limbs: &RegisterLimbsMap) -> Result<Module>;
}

impl Subdivide for Module {
    fn subdivide(&self, field: &FieldConfig, limbs: &RegisterLimbsMap) -> Result<Module> {
        let mut alloc = RegisterAllocator::new(limbs.limbs().to_vec());

        let mut constraints = Vec::new();
        for constraint in &self.constraints {
            let pieces = subdivide_constraint(constraint, field, limbs, &mut alloc)
                .with_context(|| {
                    format!(
                        "module `{}`: constraint `{}`",
                        self.name,
                        constraint.handle(),
                    )
                })?;
            constraints.extend(pieces);
        }

        let mut assignments = Vec::new();
        for assignment in &self.assignments {
            let pieces = subdivide_module_assignment(assignment, field, limbs, &mut alloc)
                .with_context(|| {
                    format!("module `{}`: assignment `{assignment}`", self.name)
                })?;
            assignments.extend(pieces);
        }

        // Every carry queued along the way becomes a computation filling
        // the carry register from the bits of its source chunk.
        for carry in alloc.assignments() {
            assignments.push(Assignment::shifted(carry.reg, carry.shift, carry.expr));
        }

        debug!(
            "module `{}`: {} -> {} registers, {} -> {} constraints, {} -> {} assignments",
            self.name,
            self.registers.len(),
            alloc.len(),
            self.constraints.len(),
            constraints.len(),
            self.assignments.len(),
            assignments.len(),
        );
        Ok(Module {
            name: self.name.clone(),
            registers: alloc.into_registers(),
            constraints,
            assignments,
        })
    }
}

fn subdivide_constraint(
    constraint: &Constraint,
    field: &FieldConfig,
    limbs: &RegisterLimbsMap,
    alloc: &mut RegisterAllocator,
) -> Result<Vec<Constraint>> {
    let (handle, equation) = match constraint {
        Constraint::Equation { handle, eq } => (
            handle,
            Equation::new(limbs.substitute(&eq.lhs), limbs.substitute(&eq.rhs)),
        ),
        Constraint::Vanishes { handle, expr } => (
            handle,
            Equation::new(Polynomial::zero(), limbs.substitute(expr)),
        ),
        Constraint::Permutation { handle, .. } => {
            bail!("`{handle}` is not field-agnostic: permutation constraints have no polynomial form")
        }
    };
    Ok(subdivide_equation(&equation, field, alloc)?
        .into_iter()
        .map(|eq| Constraint::Equation {
            handle: handle.clone(),
            eq,
        })
        .collect())
}

fn subdivide_module_assignment(
    assignment: &Assignment,
    field: &FieldConfig,
    limbs: &RegisterLimbsMap,
    alloc: &mut RegisterAllocator,
) -> Result<Vec<Assignment>> {
    let targets = assignment
        .targets
        .iter()
        .flat_map(|t| limbs.limbs_of(*t).iter().copied())
        .collect_vec();
    let expr = limbs.substitute(&assignment.expr);
    if assignment.shift > 0 {
        // A carry fill from an earlier rewrite; it cannot be re-chunked,
        // only checked.
        ensure!(
            alloc.poly_width(&expr).bits <= field.bandwidth,
            "shifted assignment exceeds the {}-bit bandwidth",
            field.bandwidth,
        );
        return Ok(vec![Assignment {
            targets,
            shift: assignment.shift,
            expr,
        }]);
    }
    subdivide_assignment(&targets, &expr, field, alloc)
}

/// Rewrites a whole schema for the given field: builds the limb map, then
/// lets every module subdivide its constraints and assignments against it.
/// Returns the rewritten schema along with the map, which downstream
/// tooling needs to split concrete trace columns.
pub fn subdivide_schema(schema: &Schema, field: &FieldConfig) -> Result<(Schema, LimbMap)> {
    field.validate()?;
    let maps = schema
        .modules
        .iter()
        .map(|m| RegisterLimbsMap::build(field, m))
        .collect::<Result<Vec<_>>>()?;
    let modules = schema
        .modules
        .iter()
        .zip_eq(&maps)
        .map(|(m, map)| m.subdivide(field, map))
        .collect::<Result<Vec<_>>>()?;
    Ok((
        Schema::new(modules),
        LimbMap {
            field: field.clone(),
            modules: maps,
        },
    ))
}
