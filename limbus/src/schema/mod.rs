pub mod assignment;
pub mod constraint;
pub mod field;
pub mod register;

use serde::{Deserialize, Serialize};

pub use crate::schema::assignment::Assignment;
pub use crate::schema::constraint::{Constraint, Equation};
pub use crate::schema::field::FieldConfig;
pub use crate::schema::register::{RegId, Register, RegisterKind};

/// A named collection of registers together with the constraints and
/// assignments over them. Register IDs index `registers`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub registers: Vec<Register>,
    pub constraints: Vec<Constraint>,
    pub assignments: Vec<Assignment>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registers: Vec::new(),
            constraints: Vec::new(),
            assignments: Vec::new(),
        }
    }

    pub fn add_register(&mut self, register: Register) -> RegId {
        self.registers.push(register);
        RegId(self.registers.len() - 1)
    }

    pub fn register(&self, id: RegId) -> &Register {
        &self.registers[id.0]
    }

    pub fn width(&self, id: RegId) -> usize {
        self.registers[id.0].width
    }

    /// Width environment over this module's registers, for polynomial
    /// interval analysis.
    pub fn widths(&self) -> impl Fn(&RegId) -> usize + '_ {
        |id| self.registers[id.0].width
    }

    pub fn register_id(&self, name: &str) -> Option<RegId> {
        self.registers
            .iter()
            .position(|r| r.name == name)
            .map(RegId)
    }
}

/// An ordered sequence of modules.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub modules: Vec<Module>,
}

impl Schema {
    pub fn new(modules: Vec<Module>) -> Self {
        Self { modules }
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }
}
