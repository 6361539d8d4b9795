//! VM-side validation
//!
//! A VM interpreter reports each executed instruction with its concrete
//! operand and result words. [`PlanValidator`] binds those words onto the
//! instruction's generated clauses (and its dependency's, for JZ/JNZ), runs
//! unit propagation over the composed system and reports whether the
//! execution satisfies every clause.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::config::{GeneratorConfig, ViolationPolicy};
use crate::contract::{Assignment, Expr, Role, VariableId};
use crate::decompose::NibbleDecomposer;
use crate::error::{GenerationError, ValidationError};
use crate::isa::InstructionKind;
use crate::solver::builtin::propagate;

/// Interface a VM interpreter calls after executing an instruction
pub trait ConstraintValidator {
    /// `Ok(true)` when the execution satisfies the instruction's constraints
    fn validate(
        &self,
        instruction: InstructionKind,
        inputs: &[u32],
        outputs: &[u32],
    ) -> Result<bool, ValidationError>;
}

/// Where one operand word lives in an instruction's variables
#[derive(Debug, Clone, Copy)]
pub enum Port {
    /// Every bit of the word
    Word(fn(u8) -> Role),
    /// Bit 0 of the value, as an instruction-level flag
    Flag(Role),
    /// Four bits on the first nibble
    FirstNibble(fn(u8) -> Role),
    /// Four bits on the last nibble
    LastNibble(fn(u8) -> Role),
    /// Compared against zero by the instruction's dependency
    Condition,
}

#[derive(Debug, Clone)]
pub struct OperandShape {
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
}

impl OperandShape {
    fn new(inputs: Vec<Port>, outputs: Vec<Port>) -> Self {
        Self { inputs, outputs }
    }
}

/// Operand and result layout of `kind`
pub fn operand_shape(kind: InstructionKind) -> OperandShape {
    use InstructionKind::*;
    use Port::*;
    let ab = || vec![Word(Role::OperandA), Word(Role::OperandB)];
    match kind {
        Add | Sub => OperandShape::new(ab(), vec![Word(Role::Result), Flag(Role::Overflow)]),
        And | Or | Xor => OperandShape::new(ab(), vec![Word(Role::Result)]),
        Not => OperandShape::new(vec![Word(Role::OperandA)], vec![Word(Role::Result)]),
        Shl => OperandShape::new(
            vec![Word(Role::OperandA)],
            vec![Word(Role::Result), Flag(Role::Overflow)],
        ),
        Shr => OperandShape::new(
            vec![Word(Role::OperandA)],
            vec![Word(Role::Result), Flag(Role::Underflow)],
        ),
        Eq => OperandShape::new(ab(), vec![Flag(Role::EqualFinal)]),
        Neq => OperandShape::new(ab(), vec![Flag(Role::DifferFinal)]),
        Lt => OperandShape::new(ab(), vec![Flag(Role::LessFinal)]),
        Gt => OperandShape::new(ab(), vec![Flag(Role::GreaterFinal)]),
        Lte | Gte => OperandShape::new(ab(), vec![Flag(Role::OrEqualFinal)]),
        Load | Mload => OperandShape::new(
            vec![Word(Role::Address), Word(Role::Value)],
            vec![Word(Role::Result), Flag(Role::Ok)],
        ),
        Store | Mstore => OperandShape::new(
            vec![Word(Role::Address), Word(Role::Value)],
            vec![Word(Role::BusData), Flag(Role::Ok)],
        ),
        Push | Dup => OperandShape::new(
            vec![Word(Role::StackPointer), Word(Role::Value)],
            vec![Word(Role::NextStackPointer), Word(Role::Slot)],
        ),
        Pop => OperandShape::new(
            vec![Word(Role::StackPointer), Word(Role::Slot)],
            vec![Word(Role::NextStackPointer), Word(Role::Value)],
        ),
        Swap => OperandShape::new(ab(), vec![Word(Role::Result), Word(Role::Second)]),
        Jmp => OperandShape::new(vec![Word(Role::Target)], vec![Word(Role::NextPc)]),
        Jz | Jnz => OperandShape::new(
            vec![Word(Role::Pc), Word(Role::Target), Condition],
            vec![Word(Role::NextPc)],
        ),
        Call => OperandShape::new(
            vec![Word(Role::Pc), Word(Role::Target)],
            vec![Word(Role::NextPc), Word(Role::ReturnAddress)],
        ),
        Ret => OperandShape::new(vec![Word(Role::ReturnAddress)], vec![Word(Role::NextPc)]),
        Hash => OperandShape::new(vec![Word(Role::Message)], vec![LastNibble(Role::StateOut)]),
        Sign => OperandShape::new(
            vec![Word(Role::Message), Word(Role::Key)],
            vec![LastNibble(Role::StateOut)],
        ),
        Verify => OperandShape::new(
            vec![Word(Role::Message), Word(Role::Key), FirstNibble(Role::Tag)],
            vec![Flag(Role::Ok)],
        ),
        Nop | Halt => OperandShape::new(Vec::new(), Vec::new()),
    }
}

/// Outcome of checking one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub instruction: InstructionKind,
    pub satisfied: bool,
    /// Rendered clauses that evaluated false
    pub violated: Vec<String>,
    /// Clauses left without a value
    pub undetermined: usize,
}

pub struct PlanValidator {
    decomposer: NibbleDecomposer,
    policy: ViolationPolicy,
    systems: Mutex<BTreeMap<InstructionKind, Arc<Vec<Expr>>>>,
    validations: AtomicU64,
    violations: AtomicU64,
}

impl PlanValidator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        Ok(Self::with_decomposer(NibbleDecomposer::new(config)?, config.violation_policy))
    }

    pub fn with_decomposer(decomposer: NibbleDecomposer, policy: ViolationPolicy) -> Self {
        Self {
            decomposer,
            policy,
            systems: Mutex::new(BTreeMap::new()),
            validations: AtomicU64::new(0),
            violations: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    pub fn validations(&self) -> u64 {
        self.validations.load(Ordering::Relaxed)
    }

    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }

    /// Clauses of `kind`'s plan followed by those of its dependencies,
    /// generated on first use
    fn system(&self, kind: InstructionKind) -> Result<Arc<Vec<Expr>>, GenerationError> {
        let mut systems = self.systems.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(system) = systems.get(&kind) {
            return Ok(Arc::clone(system));
        }
        let mut clauses: Vec<Expr> = self.decomposer.decompose(kind)?.clauses().cloned().collect();
        for &dependency in kind.dependencies() {
            clauses.extend(self.decomposer.decompose(dependency)?.clauses().cloned());
        }
        debug!(%kind, clauses = clauses.len(), "composed clause system");
        let system = Arc::new(clauses);
        systems.insert(kind, Arc::clone(&system));
        Ok(system)
    }

    fn bind(&self, kind: InstructionKind, port: Port, value: u32, assignment: &mut Assignment) {
        let width = self.decomposer.width_nibbles();
        let bit = |v: u32, i: u32| (v >> i) & 1 == 1;
        match port {
            Port::Word(role) => {
                for i in 0..width as u32 * 4 {
                    assignment.insert(VariableId::global_bit(kind, i, role), bit(value, i));
                }
            }
            Port::Flag(role) => {
                assignment.insert(VariableId::instruction(kind, role), bit(value, 0));
            }
            Port::FirstNibble(role) | Port::LastNibble(role) => {
                let n = if matches!(port, Port::FirstNibble(_)) { 0 } else { width - 1 };
                for i in 0..4u8 {
                    assignment.insert(VariableId::bit(kind, n, role(i)), bit(value, i as u32));
                }
            }
            Port::Condition => {
                for &dependency in kind.dependencies() {
                    self.bind(dependency, Port::Word(Role::OperandA), value, assignment);
                    self.bind(dependency, Port::Word(Role::OperandB), 0, assignment);
                }
            }
        }
    }

    fn read(&self, kind: InstructionKind, port: Port, assignment: &Assignment) -> Option<u32> {
        let width = self.decomposer.width_nibbles();
        let word = |ids: Vec<VariableId>| {
            ids.iter().enumerate().try_fold(0u32, |acc, (i, id)| {
                assignment.get(id).map(|&set| acc | ((set as u32) << i))
            })
        };
        match port {
            Port::Word(role) => word(
                (0..width as u32 * 4)
                    .map(|i| VariableId::global_bit(kind, i, role))
                    .collect(),
            ),
            Port::Flag(role) => word(vec![VariableId::instruction(kind, role)]),
            Port::FirstNibble(role) | Port::LastNibble(role) => {
                let n = if matches!(port, Port::FirstNibble(_)) { 0 } else { width - 1 };
                word((0..4u8).map(|i| VariableId::bit(kind, n, role(i))).collect())
            }
            Port::Condition => None,
        }
    }

    fn check_shape(
        kind: InstructionKind,
        shape: &OperandShape,
        inputs: usize,
        outputs: Option<usize>,
    ) -> Result<(), ValidationError> {
        let outputs_ok = outputs.map_or(true, |n| n == shape.outputs.len());
        if inputs != shape.inputs.len() || !outputs_ok {
            return Err(ValidationError::OperandShape {
                instruction: kind,
                inputs: shape.inputs.len(),
                outputs: shape.outputs.len(),
                got_inputs: inputs,
                got_outputs: outputs.unwrap_or(shape.outputs.len()),
            });
        }
        Ok(())
    }

    /// Checks one execution without applying the violation policy
    pub fn check(
        &self,
        kind: InstructionKind,
        inputs: &[u32],
        outputs: &[u32],
    ) -> Result<Execution, ValidationError> {
        let shape = operand_shape(kind);
        Self::check_shape(kind, &shape, inputs.len(), Some(outputs.len()))?;
        let system = self.system(kind)?;

        let mut assignment = Assignment::new();
        for (&port, &value) in shape.inputs.iter().zip(inputs) {
            self.bind(kind, port, value, &mut assignment);
        }
        for (&port, &value) in shape.outputs.iter().zip(outputs) {
            self.bind(kind, port, value, &mut assignment);
        }
        propagate(&system, &mut assignment);

        let mut violated = Vec::new();
        let mut undetermined = 0;
        for clause in system.iter() {
            match clause.eval(&assignment) {
                Some(true) => {}
                Some(false) => violated.push(clause.to_string()),
                None => undetermined += 1,
            }
        }
        Ok(Execution {
            instruction: kind,
            satisfied: violated.is_empty() && undetermined == 0,
            violated,
            undetermined,
        })
    }

    /// Result words the constraints determine for `inputs`, in output order
    pub fn execute(
        &self,
        kind: InstructionKind,
        inputs: &[u32],
    ) -> Result<Vec<Option<u32>>, ValidationError> {
        let shape = operand_shape(kind);
        Self::check_shape(kind, &shape, inputs.len(), None)?;
        let system = self.system(kind)?;

        let mut assignment = Assignment::new();
        for (&port, &value) in shape.inputs.iter().zip(inputs) {
            self.bind(kind, port, value, &mut assignment);
        }
        propagate(&system, &mut assignment);
        Ok(shape
            .outputs
            .iter()
            .map(|&port| self.read(kind, port, &assignment))
            .collect())
    }
}

impl ConstraintValidator for PlanValidator {
    fn validate(
        &self,
        instruction: InstructionKind,
        inputs: &[u32],
        outputs: &[u32],
    ) -> Result<bool, ValidationError> {
        self.validations.fetch_add(1, Ordering::Relaxed);
        let execution = self.check(instruction, inputs, outputs)?;
        if execution.satisfied {
            return Ok(true);
        }

        self.violations.fetch_add(1, Ordering::Relaxed);
        let clause = execution
            .violated
            .first()
            .cloned()
            .unwrap_or_else(|| format!("{} clauses undetermined", execution.undetermined));
        warn!(%instruction, %clause, policy = ?self.policy, "constraint violation");
        match self.policy {
            ViolationPolicy::Advisory => Ok(false),
            ViolationPolicy::Halt => Err(ValidationError::ConstraintViolation { instruction, clause }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompose::crypto::{reference_digest, RotateXorMix};

    fn validator() -> PlanValidator {
        PlanValidator::new(&GeneratorConfig::default()).unwrap()
    }

    fn run(kind: InstructionKind, inputs: &[u32]) -> Vec<u32> {
        validator()
            .execute(kind, inputs)
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn test_advisory_counts_violations() {
        let v = validator();
        assert!(v.validate(InstructionKind::Add, &[3, 4], &[7, 0]).unwrap());
        assert!(!v.validate(InstructionKind::Add, &[3, 4], &[8, 0]).unwrap());
        assert_eq!(v.validations(), 2);
        assert_eq!(v.violations(), 1);
    }

    #[test]
    fn test_halt_policy_fails_the_call() {
        let v = PlanValidator::with_decomposer(NibbleDecomposer::with_width(8).unwrap(), ViolationPolicy::Halt);
        let err = v.validate(InstructionKind::Xor, &[0xF0, 0x0F], &[0x00]).unwrap_err();
        assert!(matches!(err, ValidationError::ConstraintViolation { instruction: InstructionKind::Xor, .. }));
        assert_eq!(v.violations(), 1);
    }

    #[test]
    fn test_operand_shape_mismatch() {
        let err = validator().validate(InstructionKind::Add, &[1], &[1, 0]).unwrap_err();
        assert!(matches!(err, ValidationError::OperandShape { inputs: 2, got_inputs: 1, .. }));
    }

    #[test]
    fn test_arithmetic_and_flags() {
        assert_eq!(run(InstructionKind::Add, &[0xFFFF_FFFF, 1]), vec![0, 1]);
        assert_eq!(run(InstructionKind::Sub, &[3, 5]), vec![0xFFFF_FFFE, 1]);
        assert_eq!(run(InstructionKind::Sub, &[5, 3]), vec![2, 0]);
        assert_eq!(run(InstructionKind::Shr, &[1]), vec![0, 1]);
        assert_eq!(run(InstructionKind::Shl, &[0x8000_0001]), vec![2, 1]);
        assert_eq!(run(InstructionKind::Not, &[0]), vec![0xFFFF_FFFF]);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run(InstructionKind::Lt, &[0x1F, 0x2F]), vec![1]);
        assert_eq!(run(InstructionKind::Lt, &[0x3F, 0x3F]), vec![0]);
        assert_eq!(run(InstructionKind::Eq, &[0x3F, 0x3F]), vec![1]);
        assert_eq!(run(InstructionKind::Gte, &[0x3F, 0x3F]), vec![1]);
        assert_eq!(run(InstructionKind::Gt, &[0x1F, 0x2F]), vec![0]);
        assert_eq!(run(InstructionKind::Neq, &[7, 8]), vec![1]);
    }

    #[test]
    fn test_conditional_jumps_use_dependency() {
        assert_eq!(run(InstructionKind::Jz, &[0x100, 0x200, 0]), vec![0x200]);
        assert_eq!(run(InstructionKind::Jz, &[0x100, 0x200, 5]), vec![0x104]);
        assert_eq!(run(InstructionKind::Jnz, &[0x100, 0x200, 5]), vec![0x200]);
        assert_eq!(run(InstructionKind::Jnz, &[0x100, 0x200, 0]), vec![0x104]);
        assert_eq!(run(InstructionKind::Call, &[0x100, 0x200]), vec![0x200, 0x104]);
        assert_eq!(run(InstructionKind::Ret, &[0x104]), vec![0x104]);
    }

    #[test]
    fn test_memory_and_stack() {
        assert_eq!(run(InstructionKind::Load, &[0x10, 0xAB]), vec![0xAB, 1]);
        assert_eq!(run(InstructionKind::Load, &[0x11, 0xAB]), vec![0xAB, 0]);
        assert_eq!(run(InstructionKind::Store, &[0x1_0000, 7]), vec![7, 0]);
        assert_eq!(run(InstructionKind::Push, &[0x100, 9]), vec![0x104, 9]);
        assert_eq!(run(InstructionKind::Pop, &[0x100, 9]), vec![0xFC, 9]);
        assert_eq!(run(InstructionKind::Swap, &[1, 2]), vec![2, 1]);
    }

    #[test]
    fn test_crypto_matches_reference() {
        let message = 0xDEAD_BEEF;
        let key = 0x0123_4567;
        let digest = reference_digest(&RotateXorMix, 8, message, None) as u32;
        assert_eq!(run(InstructionKind::Hash, &[message]), vec![digest]);

        let tag = reference_digest(&RotateXorMix, 8, message, Some(key)) as u32;
        assert_eq!(run(InstructionKind::Sign, &[message, key]), vec![tag]);
        assert_eq!(run(InstructionKind::Verify, &[message, key, tag]), vec![1]);
        assert_eq!(run(InstructionKind::Verify, &[message, key, tag ^ 1]), vec![0]);
    }

    #[test]
    fn test_system_instructions_always_validate() {
        let v = validator();
        assert!(v.validate(InstructionKind::Nop, &[], &[]).unwrap());
        assert!(v.validate(InstructionKind::Halt, &[], &[]).unwrap());
    }
}
