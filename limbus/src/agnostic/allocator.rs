use limbus_algebra::poly::Polynomial;
use limbus_algebra::width::ValueWidth;

use crate::schema::{RegId, Register};

/// A queued carry-fill rule: at every row, `reg` holds `expr >> shift`.
#[derive(Clone, Debug)]
pub struct CarryAssignment {
    pub reg: RegId,
    pub shift: usize,
    pub expr: Polynomial<RegId>,
}

/// A point to roll a [`RegisterAllocator`] back to after speculative
/// chunking. Rolling back truncates both the register list and the queued
/// carry fills; the name counter is left alone so names stay unique.
#[derive(Copy, Clone, Debug)]
pub struct AllocatorCheckpoint {
    registers: usize,
    queued: usize,
}

/// Owns the register list of a module being rewritten: the module's limbs,
/// plus whatever computed registers (carries, sign bits, sub-limbs) the
/// chunkers allocate along the way.
#[derive(Clone, Debug)]
pub struct RegisterAllocator {
    registers: Vec<Register>,
    queued: Vec<CarryAssignment>,
    fresh: usize,
    consts: [Option<RegId>; 2],
}

impl RegisterAllocator {
    pub fn new(limbs: Vec<Register>) -> Self {
        Self {
            registers: limbs,
            queued: Vec::new(),
            fresh: 0,
            consts: [None, None],
        }
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    pub fn register(&self, id: RegId) -> &Register {
        &self.registers[id.0]
    }

    pub fn width(&self, id: RegId) -> usize {
        self.registers[id.0].width
    }

    /// Width environment over the current register list.
    pub fn widths(&self) -> impl Fn(&RegId) -> usize + '_ {
        |id| self.registers[id.0].width
    }

    pub fn poly_width(&self, p: &Polynomial<RegId>) -> ValueWidth {
        p.value_width(&self.widths())
    }

    /// Creates a fresh computed register named `"{prefix}${n}"` with a
    /// monotonically increasing `n`, padding 0.
    pub fn allocate(&mut self, prefix: &str, width: usize) -> RegId {
        let name = format!("{prefix}${}", self.fresh);
        self.fresh += 1;
        self.push(Register::computed(name, width))
    }

    pub fn allocate_many(&mut self, prefix: &str, widths: &[usize]) -> Vec<RegId> {
        widths.iter().map(|&w| self.allocate(prefix, w)).collect()
    }

    /// Creates a fresh computed register under a caller-chosen name, used
    /// for sub-limbs named after the register they subdivide.
    pub fn allocate_named(&mut self, name: String, width: usize) -> RegId {
        self.push(Register::computed(name, width))
    }

    /// The constant-0 or constant-1 register, created on first request and
    /// shared afterwards.
    pub fn const_register(&mut self, one: bool) -> RegId {
        if let Some(id) = self.consts[one as usize] {
            return id;
        }
        let id = self.push(if one {
            Register::const_one()
        } else {
            Register::const_zero()
        });
        self.consts[one as usize] = Some(id);
        id
    }

    /// Queues the carry fill `reg := expr >> shift`.
    pub fn assign(&mut self, reg: RegId, shift: usize, expr: Polynomial<RegId>) {
        self.queued.push(CarryAssignment { reg, shift, expr });
    }

    /// Drains the queued carry fills.
    pub fn assignments(&mut self) -> Vec<CarryAssignment> {
        std::mem::take(&mut self.queued)
    }

    pub fn checkpoint(&self) -> AllocatorCheckpoint {
        AllocatorCheckpoint {
            registers: self.registers.len(),
            queued: self.queued.len(),
        }
    }

    pub fn reset(&mut self, checkpoint: AllocatorCheckpoint) {
        self.registers.truncate(checkpoint.registers);
        self.queued.truncate(checkpoint.queued);
        for cached in &mut self.consts {
            if cached.is_some_and(|id| id.0 >= checkpoint.registers) {
                *cached = None;
            }
        }
    }

    pub fn into_registers(self) -> Vec<Register> {
        self.registers
    }

    fn push(&mut self, register: Register) -> RegId {
        self.registers.push(register);
        RegId(self.registers.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> RegisterAllocator {
        RegisterAllocator::new(vec![
            Register::input("x", 8),
            Register::input("y", 8),
        ])
    }

    #[test]
    fn test_allocate_names() {
        let mut alloc = seeded();
        let c0 = alloc.allocate("carry", 1);
        let c1 = alloc.allocate("carry", 4);
        assert_eq!(c0, RegId(2));
        assert_eq!(c1, RegId(3));
        assert_eq!(alloc.register(c0).name, "carry$0");
        assert_eq!(alloc.register(c1).name, "carry$1");
        assert_eq!(alloc.width(c1), 4);
    }

    #[test]
    fn test_allocate_many() {
        let mut alloc = seeded();
        let subs = alloc.allocate_many("x'", &[4, 4]);
        assert_eq!(subs, vec![RegId(2), RegId(3)]);
        assert_eq!(alloc.width(subs[0]), 4);
        assert_eq!(alloc.register(subs[1]).name, "x'$1");
    }

    #[test]
    fn test_checkpoint_reset() {
        let mut alloc = seeded();
        let cp = alloc.checkpoint();
        let c = alloc.allocate("carry", 1);
        alloc.assign(c, 8, Polynomial::var(RegId(0)));
        assert_eq!(alloc.len(), 3);

        alloc.reset(cp);
        assert_eq!(alloc.len(), 2);
        assert!(alloc.assignments().is_empty());

        // Names remain unique across a rollback.
        let c2 = alloc.allocate("carry", 1);
        assert_eq!(alloc.register(c2).name, "carry$1");
    }

    #[test]
    fn test_const_register_cached() {
        let mut alloc = seeded();
        let one = alloc.const_register(true);
        assert_eq!(alloc.const_register(true), one);
        assert_ne!(alloc.const_register(false), one);
        assert_eq!(alloc.register(one).width, 1);

        // A rolled-back const register is forgotten.
        let cp = alloc.checkpoint();
        let extra = alloc.const_register(true);
        assert_eq!(extra, one); // cached, predates the checkpoint
        alloc.reset(cp);
        assert_eq!(alloc.const_register(true), one);
    }

    #[test]
    fn test_assignments_drain() {
        let mut alloc = seeded();
        let c = alloc.allocate("carry", 1);
        alloc.assign(c, 8, Polynomial::var(RegId(0)));
        let drained = alloc.assignments();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].reg, c);
        assert_eq!(drained[0].shift, 8);
        assert!(alloc.assignments().is_empty());
    }
}
