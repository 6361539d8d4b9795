//! Nibble decomposition
//!
//! Lowers one instruction into an [`InstructionPlan`]: one component per
//! nibble, the linkers that carry values across nibble boundaries, and any
//! aggregation or check components. The strategy is selected by the
//! instruction's [`OperationFamily`].

mod arith;
mod bitwise;
mod compare;
mod control;
pub mod crypto;
mod memory;

use std::sync::Arc;

use crate::config::GeneratorConfig;
use crate::contract::{
    CarryFlags, Component, ComponentKind, Contract, Expr, InstructionPlan, LinkSpec, Role,
    VariableId,
};
use crate::error::GenerationError;
use crate::isa::{InstructionKind, OperationFamily, SystemOp};
use crate::link::CarryLinker;

pub use crypto::{MixingFunction, RotateXorMix};

/// Maximum operand width: 32-bit words
pub const MAX_WIDTH_NIBBLES: u8 = 8;

#[derive(Debug, Clone)]
pub struct NibbleDecomposer {
    width: u8,
    word_bytes: u8,
    memory_address_bits: u8,
    mixer: Arc<dyn MixingFunction>,
}

impl NibbleDecomposer {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let mut decomposer = Self::with_width(config.word_nibbles)?;
        decomposer.word_bytes = config.word_bytes;
        decomposer.memory_address_bits = config.memory_address_bits;
        Ok(decomposer)
    }

    /// Decomposer for `width` nibbles with default memory and stack geometry
    pub fn with_width(width: u8) -> Result<Self, GenerationError> {
        if !(1..=MAX_WIDTH_NIBBLES).contains(&width) {
            return Err(GenerationError::InvalidWidth(width));
        }
        let defaults = GeneratorConfig::default();
        Ok(Self {
            width,
            word_bytes: defaults.word_bytes,
            memory_address_bits: defaults.memory_address_bits,
            mixer: Arc::new(RotateXorMix),
        })
    }

    /// Replaces the mixing function used by the crypto placeholders
    pub fn with_mixer(mut self, mixer: Arc<dyn MixingFunction>) -> Self {
        self.mixer = mixer;
        self
    }

    pub fn width_nibbles(&self) -> u8 {
        self.width
    }

    pub fn word_bytes(&self) -> u8 {
        self.word_bytes
    }

    pub fn memory_address_bits(&self) -> u8 {
        self.memory_address_bits
    }

    pub fn mixer(&self) -> &dyn MixingFunction {
        self.mixer.as_ref()
    }

    /// Builds every component of `kind`'s plan. Budget checks happen later.
    pub fn decompose(&self, kind: InstructionKind) -> Result<InstructionPlan, GenerationError> {
        let mut builder = PlanBuilder::new(kind, self.width);
        match kind.family() {
            OperationFamily::CarryChain(op) => arith::build(&mut builder, op),
            OperationFamily::Parallel(op) => bitwise::build_parallel(&mut builder, op),
            OperationFamily::Shift(direction) => bitwise::build_shift(&mut builder, direction),
            OperationFamily::Comparison(op) => compare::build(&mut builder, op)?,
            OperationFamily::Memory(access, space) => {
                memory::build_memory(&mut builder, access, space, self.word_bytes, self.memory_address_bits)
            }
            OperationFamily::Stack(op) => memory::build_stack(&mut builder, op, self.word_bytes),
            OperationFamily::Control(op) => control::build(&mut builder, op, self.word_bytes),
            OperationFamily::Crypto(op) => crypto::build(&mut builder, op, self.mixer.as_ref()),
            OperationFamily::System(op) => build_system(&mut builder, op),
        }
        Ok(builder.finish())
    }
}

fn build_system(builder: &mut PlanBuilder, op: SystemOp) {
    let kind = builder.kind();
    let role = match op {
        SystemOp::Nop => Role::Ok,
        SystemOp::Halt => Role::Halted,
    };
    let mut clauses = NibbleClauses::default();
    clauses.export(VariableId::instruction(kind, role), Expr::constant(true));
    builder.push_extra(clauses.into_standalone(format!("{}_component", kind.prefix()), ComponentKind::Check));
}

/// Clauses of one component under construction
#[derive(Debug, Default)]
pub(crate) struct NibbleClauses {
    assumptions: Vec<Expr>,
    guarantees: Vec<Expr>,
    constraints: Vec<Expr>,
}

impl NibbleClauses {
    /// Requires `id` to be Boolean
    pub fn assume_boolean(&mut self, id: VariableId) {
        self.assumptions.push(Expr::boolean_domain(id));
    }

    /// Internal definition, not part of the component's interface
    pub fn define(&mut self, id: VariableId, value: Expr) {
        self.constraints.push(Expr::defines(id, value));
    }

    /// Definition the component guarantees to its consumers
    pub fn export(&mut self, id: VariableId, value: Expr) {
        let clause = Expr::defines(id, value);
        self.guarantees.push(clause.clone());
        self.constraints.push(clause);
    }

    pub fn into_contract(self, name: String) -> Contract {
        Contract::new(name, self.assumptions, self.guarantees, self.constraints)
    }

    pub fn into_nibble(self, name: String, nibble: u8, carries: CarryFlags) -> Component {
        Component::nibble(self.into_contract(name), nibble, carries)
    }

    pub fn into_standalone(self, name: String, kind: ComponentKind) -> Component {
        Component::standalone(self.into_contract(name), kind)
    }
}

/// Accumulates a plan in emission order: nibbles, then linkers, then the rest
pub(crate) struct PlanBuilder {
    kind: InstructionKind,
    width: u8,
    nibbles: Vec<Component>,
    linkers: Vec<Component>,
    extras: Vec<Component>,
    links: Vec<LinkSpec>,
    linker: CarryLinker,
}

impl PlanBuilder {
    pub fn new(kind: InstructionKind, width: u8) -> Self {
        Self {
            kind,
            width,
            nibbles: Vec::new(),
            linkers: Vec::new(),
            extras: Vec::new(),
            links: Vec::new(),
            linker: CarryLinker::new(),
        }
    }

    pub fn kind(&self) -> InstructionKind {
        self.kind
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// `<prefix>_nibble_<n>` or `<prefix>_<lane>_nibble_<n>`
    pub fn nibble_name(&self, lane: Option<&str>, nibble: u8) -> String {
        match lane {
            Some(lane) => format!("{}_{}_nibble_{}", self.kind.prefix(), lane, nibble),
            None => format!("{}_nibble_{}", self.kind.prefix(), nibble),
        }
    }

    /// Adds a nibble component and returns its position for linking
    pub fn push_nibble(&mut self, component: Component) -> usize {
        self.nibbles.push(component);
        self.nibbles.len() - 1
    }

    pub fn push_extra(&mut self, component: Component) {
        self.extras.push(component);
    }

    /// Links `produced` of nibble component `from` to `consumed` of `to`
    pub fn link(
        &mut self,
        from: usize,
        to: usize,
        produced: VariableId,
        consumed: VariableId,
        lane: Option<usize>,
    ) {
        let (spec, component) =
            self.linker
                .connect(&self.nibbles[from], &self.nibbles[to], produced, consumed, lane);
        self.links.push(spec);
        self.linkers.push(component);
    }

    pub fn finish(self) -> InstructionPlan {
        let mut components = self.nibbles;
        components.extend(self.linkers);
        components.extend(self.extras);
        InstructionPlan::new(self.kind, self.width, components, self.links)
    }
}

/// Clauses `role(off) = source(off)` for the four bits of nibble `n`
pub(crate) fn export_copy(
    clauses: &mut NibbleClauses,
    kind: InstructionKind,
    n: u8,
    role: fn(u8) -> Role,
    source: fn(u8) -> Role,
) {
    for off in 0..4 {
        clauses.export(
            VariableId::bit(kind, n, role(off)),
            Expr::var(VariableId::bit(kind, n, source(off))),
        );
    }
}
